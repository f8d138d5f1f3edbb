use crate::context::BuildContext;
use crate::error::{EngineError, Result};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};
use std::collections::HashMap;
use std::path::PathBuf;

/// イメージビルドの設定
#[derive(Debug, Clone, Default)]
pub struct BuildSpec {
    pub context: PathBuf,
    /// コンテキストからの相対パス
    pub dockerfile: String,
    pub tag: String,
    pub target: Option<String>,
    pub build_args: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub cache_from: Vec<String>,
    pub no_cache: bool,
    pub force_remove: bool,
    pub platform: Option<String>,
}

pub struct ImageBuilder<'a> {
    docker: &'a Docker,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(docker: &'a Docker) -> Self {
        Self { docker }
    }

    /// コンテキストをアーカイブしてイメージをビルド
    pub async fn build(&self, spec: &BuildSpec) -> Result<()> {
        let context = BuildContext::open(&spec.context, &spec.dockerfile)?;
        let archive = context.archive()?;

        tracing::info!(tag = %spec.tag, "building image");
        if !spec.build_args.is_empty() {
            tracing::debug!(args = ?spec.build_args.keys().collect::<Vec<_>>(), "build args");
        }

        #[allow(deprecated)]
        let mut progress = self.docker.build_image(
            build_options(spec),
            None,
            Some(Either::Left(Full::new(Bytes::from(archive)))),
        );
        while let Some(info) = progress.next().await {
            let info = info.map_err(|e| EngineError::BuildFailed(e.to_string()))?;
            check_build_step(info)?;
        }

        tracing::info!(tag = %spec.tag, "image built");
        Ok(())
    }
}

#[allow(deprecated)]
fn build_options(spec: &BuildSpec) -> bollard::image::BuildImageOptions<String> {
    bollard::image::BuildImageOptions {
        dockerfile: spec.dockerfile.clone(),
        t: spec.tag.clone(),
        buildargs: spec.build_args.clone(),
        labels: spec.labels.clone(),
        cachefrom: spec.cache_from.clone(),
        target: spec.target.clone().unwrap_or_default(),
        platform: spec.platform.clone().unwrap_or_default(),
        nocache: spec.no_cache,
        rm: true,
        forcerm: spec.force_remove,
        ..Default::default()
    }
}

/// ビルドの進捗 1 件を検査し、失敗の報告なら Err にする
fn check_build_step(info: bollard::models::BuildInfo) -> Result<()> {
    let failure = info
        .error
        .or_else(|| info.error_detail.map(|d| d.message.unwrap_or_default()));
    if let Some(message) = failure {
        let message = if message.is_empty() {
            "unknown build error".to_string()
        } else {
            message
        };
        return Err(EngineError::BuildFailed(message));
    }

    for line in info.stream.iter().chain(info.status.iter()) {
        let line = line.trim_end();
        if !line.is_empty() {
            tracing::debug!("build: {}", line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{BuildInfo, ErrorDetail};

    #[test]
    fn test_build_step_error() {
        let output = BuildInfo {
            error: Some("failed to solve".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            check_build_step(output),
            Err(EngineError::BuildFailed(msg)) if msg == "failed to solve"
        ));

        let output = BuildInfo {
            error_detail: Some(ErrorDetail {
                code: None,
                message: Some("no space left".to_string()),
            }),
            ..Default::default()
        };
        assert!(check_build_step(output).is_err());
    }

    #[test]
    fn test_build_step_stream_ok() {
        let output = BuildInfo {
            stream: Some("Step 1/2 : FROM alpine\n".to_string()),
            ..Default::default()
        };
        assert!(check_build_step(output).is_ok());
    }

    #[tokio::test]
    #[ignore] // Docker デーモンが必要
    async fn test_build_simple_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("Dockerfile"),
            "FROM alpine:latest\nCMD echo 'test'",
        )
        .unwrap();

        let spec = BuildSpec {
            context: temp_dir.path().to_path_buf(),
            dockerfile: "Dockerfile".to_string(),
            tag: "tfdocker-test:latest".to_string(),
            ..Default::default()
        };
        ImageBuilder::new(&docker).build(&spec).await.unwrap();

        docker
            .remove_image("tfdocker-test:latest", None::<bollard::query_parameters::RemoveImageOptions>, None)
            .await
            .ok();
    }
}
