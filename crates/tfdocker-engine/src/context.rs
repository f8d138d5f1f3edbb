//! ビルドコンテキストのアーカイブ化

use crate::error::{EngineError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::{Path, PathBuf};

/// この大きさを超えたら警告だけ出す
const LARGE_CONTEXT_BYTES: usize = 500 * 1024 * 1024;

/// 検証済みのビルドコンテキスト
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    dockerfile: PathBuf,
}

impl BuildContext {
    /// コンテキストディレクトリと Dockerfile（コンテキストからの相対パス）の存在を確認する
    pub fn open(root: &Path, dockerfile: &str) -> Result<Self> {
        if !root.is_dir() {
            return Err(EngineError::ContextNotFound(root.to_path_buf()));
        }
        let dockerfile = root.join(dockerfile);
        if !dockerfile.is_file() {
            return Err(EngineError::DockerfileNotFound(dockerfile));
        }
        Ok(Self {
            root: root.to_path_buf(),
            dockerfile,
        })
    }

    pub fn dockerfile(&self) -> &Path {
        &self.dockerfile
    }

    /// ディレクトリ全体を gzip 圧縮した tar にまとめる
    pub fn archive(&self) -> Result<Vec<u8>> {
        let mut packed = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        packed.append_dir_all(".", &self.root)?;
        let bytes = packed.into_inner()?.finish()?;

        tracing::debug!(
            context = %self.root.display(),
            bytes = bytes.len(),
            "packed build context"
        );
        if bytes.len() > LARGE_CONTEXT_BYTES {
            tracing::warn!(
                "ビルドコンテキストが {}MB あります。.dockerignore で不要なファイルを除外してください",
                bytes.len() / 1024 / 1024
            );
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn entries(archive: Vec<u8>) -> Vec<String> {
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_archive_includes_tree() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine\nRUN echo test").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let context = BuildContext::open(dir.path(), "Dockerfile").unwrap();
        let names = entries(context.archive().unwrap());

        assert!(names.iter().any(|n| n.ends_with("Dockerfile")));
        assert!(names.iter().any(|n| n.ends_with("src/main.rs")));
    }

    #[test]
    fn test_nested_dockerfile() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("docker")).unwrap();
        fs::write(dir.path().join("docker/app.Dockerfile"), "FROM alpine").unwrap();

        let context = BuildContext::open(dir.path(), "docker/app.Dockerfile").unwrap();
        assert!(context.dockerfile().ends_with("docker/app.Dockerfile"));
    }

    #[test]
    fn test_open_rejects_missing_paths() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            BuildContext::open(dir.path(), "Dockerfile"),
            Err(EngineError::DockerfileNotFound(_))
        ));
        assert!(matches!(
            BuildContext::open(Path::new("/nonexistent/context"), "Dockerfile"),
            Err(EngineError::ContextNotFound(_))
        ));
    }
}
