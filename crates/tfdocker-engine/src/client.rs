//! Docker Engine クライアントの構築
//!
//! `host` のスキームに応じて接続方法を選ぶ:
//!
//! - `unix://` : Unix ソケット
//! - `tcp://` / `http://` : 平文 HTTP
//! - `tcp://` / `https://` + TLS 素材 : 相互 TLS
//!
//! 接続後に API バージョンをネゴシエートし、ping で疎通を確認する。

use crate::error::{EngineError, Result};
use bollard::Docker;
use tfdocker_config::DockerEndpoint;

/// API 呼び出しのタイムアウト（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// ホスト指定の種別
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Unix(String),
    Tcp(String),
}

/// `host` 文字列を解析
pub fn parse_host(host: &str) -> Result<HostKind> {
    if let Some(path) = host.strip_prefix("unix://") {
        return Ok(HostKind::Unix(path.to_string()));
    }

    for scheme in ["tcp://", "http://", "https://"] {
        if let Some(addr) = host.strip_prefix(scheme) {
            if addr.is_empty() {
                break;
            }
            return Ok(HostKind::Tcp(addr.to_string()));
        }
    }

    Err(EngineError::UnsupportedHost(host.to_string()))
}

/// 設定から Docker クライアントを作成し、疎通を確認する
pub async fn connect(endpoint: &DockerEndpoint) -> Result<Docker> {
    let docker = build_client(endpoint)?;

    let docker = docker.negotiate_version().await.map_err(|e| {
        EngineError::ConnectionFailed(format!(
            "failed to connect to Docker daemon at {}: {}",
            endpoint.host, e
        ))
    })?;

    docker.ping().await.map_err(|e| {
        EngineError::ConnectionFailed(format!(
            "failed to connect to Docker daemon at {}: {}",
            endpoint.host, e
        ))
    })?;

    tracing::info!("Connected to Docker daemon at {}", endpoint.host);
    Ok(docker)
}

fn build_client(endpoint: &DockerEndpoint) -> Result<Docker> {
    let client = match (parse_host(&endpoint.host)?, &endpoint.tls) {
        (HostKind::Unix(path), _) => {
            tracing::debug!("Connecting via unix socket: {}", path);
            Docker::connect_with_unix(&path, DEFAULT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        }
        (HostKind::Tcp(addr), Some(tls)) => {
            // PEM 内容は一時ファイルに書き出す。クライアント構築時に読み込まれる
            let files = tls.materialize()?;
            tracing::debug!("Connecting via TLS: {}", addr);
            Docker::connect_with_ssl(
                &format!("tcp://{}", addr),
                &files.key,
                &files.cert,
                &files.ca,
                DEFAULT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
        (HostKind::Tcp(addr), None) => {
            tracing::debug!("Connecting via http: {}", addr);
            Docker::connect_with_http(
                &format!("tcp://{}", addr),
                DEFAULT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
    };

    client.map_err(|e| {
        EngineError::ConnectionFailed(format!(
            "failed to connect to Docker daemon at {}: {}",
            endpoint.host, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host() {
        assert_eq!(
            parse_host("unix:///var/run/docker.sock").unwrap(),
            HostKind::Unix("/var/run/docker.sock".to_string())
        );
        assert_eq!(
            parse_host("tcp://10.0.0.5:2376").unwrap(),
            HostKind::Tcp("10.0.0.5:2376".to_string())
        );
        assert_eq!(
            parse_host("https://docker.internal:2376").unwrap(),
            HostKind::Tcp("docker.internal:2376".to_string())
        );
    }

    #[test]
    fn test_parse_host_rejects_unknown_scheme() {
        assert!(matches!(
            parse_host("ssh://user@host"),
            Err(EngineError::UnsupportedHost(_))
        ));
        assert!(parse_host("tcp://").is_err());
        assert!(parse_host("/var/run/docker.sock").is_err());
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_connect_local_daemon() {
        let endpoint = DockerEndpoint {
            host: tfdocker_config::DEFAULT_DOCKER_HOST.to_string(),
            tls: None,
        };
        assert!(connect(&endpoint).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_missing_socket_fails() {
        let endpoint = DockerEndpoint {
            host: "unix:///nonexistent/docker.sock".to_string(),
            tls: None,
        };
        let err = connect(&endpoint).await.unwrap_err();
        assert!(
            err.to_string()
                .contains("failed to connect to Docker daemon at unix:///nonexistent/docker.sock")
        );
    }
}
