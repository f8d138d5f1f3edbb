//! TLS 証明書の取り扱い
//!
//! Docker Engine クライアントは証明書をファイルから読み込むため、
//! PEM の中身で指定された場合は一時ディレクトリに書き出す。

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// TLS 証明書の指定方法
#[derive(Debug, Clone, PartialEq)]
pub enum TlsMaterial {
    /// ca.pem / cert.pem / key.pem を含むディレクトリ
    CertPath(PathBuf),
    /// PEM の中身
    Pem { ca: String, cert: String, key: String },
}

/// ディスク上の証明書ファイル
///
/// PEM から書き出した場合は一時ディレクトリを保持し、drop 時に削除される。
#[derive(Debug)]
pub struct TlsFiles {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
    _dir: Option<TempDir>,
}

impl TlsMaterial {
    /// 証明書ファイルのパスを確定する
    pub fn materialize(&self) -> Result<TlsFiles> {
        match self {
            TlsMaterial::CertPath(dir) => {
                let files = TlsFiles::in_dir(dir, None);
                for path in [&files.ca, &files.cert, &files.key] {
                    if !path.exists() {
                        return Err(ConfigError::CertificateNotFound(
                            path.display().to_string(),
                        ));
                    }
                }
                Ok(files)
            }
            TlsMaterial::Pem { ca, cert, key } => {
                let dir = tempfile::Builder::new().prefix("tfdocker-tls").tempdir()?;
                std::fs::write(dir.path().join("ca.pem"), ca)?;
                std::fs::write(dir.path().join("cert.pem"), cert)?;
                write_private(&dir.path().join("key.pem"), key)?;

                tracing::debug!("TLS 証明書を {:?} に書き出しました", dir.path());
                let path = dir.path().to_path_buf();
                Ok(TlsFiles::in_dir(&path, Some(dir)))
            }
        }
    }
}

impl TlsFiles {
    fn in_dir(dir: &Path, guard: Option<TempDir>) -> Self {
        Self {
            ca: dir.join("ca.pem"),
            cert: dir.join("cert.pem"),
            key: dir.join("key.pem"),
            _dir: guard,
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}
