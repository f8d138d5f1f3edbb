//! イメージの pull / push / tag / 削除

use crate::error::{EngineError, OptionalExt, Result};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::ImageInspect;
use futures_util::StreamExt;

/// イメージ操作を行うハンドラ
pub struct ImageManager<'a> {
    docker: &'a Docker,
}

impl<'a> ImageManager<'a> {
    pub fn new(docker: &'a Docker) -> Self {
        Self { docker }
    }

    /// イメージを pull する。ストリーム中のエラーも失敗として扱う
    pub async fn pull(&self, image: &str, credentials: Option<DockerCredentials>) -> Result<()> {
        let (repository, tag) = split_image_tag(image);
        tracing::debug!("Pulling image {}:{}", repository, tag);

        let mut stream = self.docker.create_image(
            Some(bollard::query_parameters::CreateImageOptions {
                from_image: Some(repository.clone()),
                tag: Some(tag.clone()),
                ..Default::default()
            }),
            None,
            credentials,
        );

        while let Some(info) = stream.next().await {
            let info = info.map_err(|e| EngineError::PullFailed(e.to_string()))?;
            if let Some(message) = info.error_detail.and_then(|d| d.message) {
                return Err(EngineError::PullFailed(message));
            }
            if let Some(status) = info.status {
                tracing::trace!("pull {}: {}", repository, status);
            }
        }

        tracing::debug!("Pulled image {}:{}", repository, tag);
        Ok(())
    }

    pub async fn inspect(&self, image: &str) -> Result<ImageInspect> {
        Ok(self.docker.inspect_image(image).await?)
    }

    /// ローカルにイメージがあるか
    pub async fn exists(&self, image: &str) -> Result<bool> {
        Ok(self.inspect(image).await.optional()?.is_some())
    }

    /// イメージ（またはタグ）を削除
    pub async fn remove(&self, image: &str, force: bool) -> Result<()> {
        self.docker
            .remove_image(
                image,
                Some(bollard::query_parameters::RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        Ok(())
    }

    /// `source` に `target` のタグを付ける
    pub async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let (repo, tag) = split_image_tag(target);
        self.docker
            .tag_image(
                source,
                Some(bollard::query_parameters::TagImageOptions {
                    repo: Some(repo),
                    tag: Some(tag),
                }),
            )
            .await?;
        Ok(())
    }

    /// イメージをレジストリにプッシュし、ダイジェストを返す
    ///
    /// ダイジェストはプッシュのステータス行から取得し、取れなければ
    /// ローカルイメージの RepoDigests を使う。
    pub async fn push(
        &self,
        image: &str,
        credentials: Option<DockerCredentials>,
    ) -> Result<Option<String>> {
        let (repository, tag) = split_image_tag(image);

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> { tag: tag.clone() };

        tracing::info!("Pushing image {}:{}", repository, tag);

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .push_image(&repository, Some(options), credentials);

        let mut digest = None;
        while let Some(info) = stream.next().await {
            let info = info.map_err(|e| EngineError::PushFailed(e.to_string()))?;
            // レジストリ側の拒否はストリームの途中で error として届く
            if let Some(message) = info.error {
                return Err(EngineError::PushFailed(message));
            }
            if let Some(status) = info.status.as_deref() {
                tracing::trace!("push {}: {}", repository, status);
                digest = parse_push_digest(status).or(digest);
            }
        }

        if digest.is_none() {
            let inspect = self.inspect(image).await?;
            digest = first_repo_digest(&inspect);
        }

        tracing::info!("Pushed image {}:{} ({:?})", repository, tag, digest);
        Ok(digest)
    }
}

/// イメージ参照をリポジトリとタグに分ける。タグがなければ `latest`
///
/// `localhost:5000/app` のようにレジストリのポートを含む場合は、最後の `/` より後ろだけを見る。
/// `@sha256:...` のダイジェスト指定は捨てる。
pub fn split_image_tag(image: &str) -> (String, String) {
    let reference = image.split_once('@').map_or(image, |(name, _)| name);
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);

    match reference[name_start..].rsplit_once(':') {
        Some((_, tag)) => {
            let repository = &reference[..reference.len() - tag.len() - 1];
            (repository.to_string(), tag.to_string())
        }
        None => (reference.to_string(), "latest".to_string()),
    }
}

/// `"latest: digest: sha256:... size: 1234"` からダイジェストを取り出す
pub fn parse_push_digest(status: &str) -> Option<String> {
    let rest = status.split("digest: ").nth(1)?;
    let digest = rest.split_whitespace().next()?;
    digest.starts_with("sha256:").then(|| digest.to_string())
}

/// `repo@sha256:...` 形式の RepoDigest からダイジェスト部分を返す
pub fn first_repo_digest(inspect: &ImageInspect) -> Option<String> {
    inspect
        .repo_digests
        .as_ref()?
        .first()
        .and_then(|d| d.split_once('@'))
        .map(|(_, digest)| digest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_image_tag_with_tag() {
        let (image, tag) = split_image_tag("ghcr.io/org/app:v1.0");
        assert_eq!(image, "ghcr.io/org/app");
        assert_eq!(tag, "v1.0");
    }

    #[test]
    fn test_split_image_tag_without_tag() {
        let (image, tag) = split_image_tag("nginx");
        assert_eq!(image, "nginx");
        assert_eq!(tag, "latest");
    }

    #[test]
    fn test_split_image_tag_with_port() {
        let (image, tag) = split_image_tag("localhost:5000/app");
        assert_eq!(image, "localhost:5000/app");
        assert_eq!(tag, "latest");

        let (image, tag) = split_image_tag("localhost:5000/app:dev");
        assert_eq!(image, "localhost:5000/app");
        assert_eq!(tag, "dev");
    }

    #[test]
    fn test_split_image_tag_drops_digest() {
        assert_eq!(
            split_image_tag("redis:7@sha256:0123"),
            ("redis".to_string(), "7".to_string())
        );
        assert_eq!(
            split_image_tag("redis@sha256:0123"),
            ("redis".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_parse_push_digest() {
        assert_eq!(
            parse_push_digest("v1: digest: sha256:abcd1234 size: 528"),
            Some("sha256:abcd1234".to_string())
        );
        assert_eq!(parse_push_digest("Pushed"), None);
        assert_eq!(parse_push_digest("digest: md5:zz"), None);
    }

    #[test]
    fn test_first_repo_digest() {
        let inspect = ImageInspect {
            repo_digests: Some(vec!["ghcr.io/org/app@sha256:feed".to_string()]),
            ..Default::default()
        };
        assert_eq!(first_repo_digest(&inspect), Some("sha256:feed".to_string()));
        assert_eq!(first_repo_digest(&ImageInspect::default()), None);
    }

    #[tokio::test]
    #[ignore] // Docker デーモンが必要
    async fn test_pull_and_inspect() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let images = ImageManager::new(&docker);
        images.pull("alpine:3.20", None).await.unwrap();
        assert!(images.exists("alpine:3.20").await.unwrap());
    }
}
