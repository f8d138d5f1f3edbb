//! レジストリの認証情報解決
//!
//! リソースに書かれた認証情報があればそれを使い、なければ Docker CLI の
//! config.json と credential helper を参照する。

use crate::error::{EngineError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::io::Write;
use std::process::{Command, Stdio};
use tfdocker_config::DockerCliConfig;

/// Docker Hub のレジストリ名
pub const DOCKER_HUB_REGISTRY: &str = "docker.io";

/// config.json で Docker Hub を指すキー
const DOCKER_HUB_KEYS: [&str; 3] = [
    "docker.io",
    "https://index.docker.io/v1/",
    "index.docker.io",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperReply {
    username: String,
    secret: String,
}

/// リソースの `registry_auth` / `auth_config` ブロックで与えられる認証情報
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryCredentials {
    pub address: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredentials {
    pub fn to_docker(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            serveraddress: Some(self.address.clone()),
            ..Default::default()
        }
    }
}

/// レジストリ認証を管理
#[derive(Debug, Default)]
pub struct RegistryAuth {
    config: DockerCliConfig,
}

impl RegistryAuth {
    /// ~/.docker/config.json（または DOCKER_CONFIG）を読み込む
    pub fn load() -> Result<Self> {
        Ok(Self {
            config: DockerCliConfig::load()?,
        })
    }

    /// 読み込み済みの設定を使用
    pub fn with_config(config: DockerCliConfig) -> Self {
        Self { config }
    }

    /// 明示された認証情報を優先し、なければ config.json から解決
    pub fn resolve(
        &self,
        image: &str,
        explicit: Option<&RegistryCredentials>,
    ) -> Result<Option<DockerCredentials>> {
        match explicit {
            Some(creds) => Ok(Some(creds.to_docker())),
            None => self.get_credentials(image),
        }
    }

    /// config.json からイメージのレジストリに対応する認証情報を探す
    ///
    /// `auths` の静的なエントリを先に見て、なければ `credsStore` の helper に問い合わせる。
    /// 見つからなければ `Ok(None)`。`auths` のエントリが壊れている場合だけ Err になる。
    pub fn get_credentials(&self, image: &str) -> Result<Option<DockerCredentials>> {
        let registry = extract_registry(image);
        let keys = registry_keys(&registry);

        for key in &keys {
            let Some(encoded) = self.config.auths.get(key).and_then(|e| e.auth.as_deref()) else {
                continue;
            };
            if let Some(creds) = decode_auth(encoded, &registry)? {
                tracing::debug!(registry = %registry, key = %key, "using credentials from config.json");
                return Ok(Some(creds));
            }
        }

        if let Some(helper) = self.config.creds_store.as_deref() {
            for key in &keys {
                match query_helper(helper, key) {
                    Ok(Some(creds)) => return Ok(Some(creds)),
                    Ok(None) => {}
                    Err(e) => tracing::debug!("credential helper {} failed: {}", helper, e),
                }
            }
        }

        tracing::debug!(registry = %registry, "no stored credentials");
        Ok(None)
    }
}

/// イメージ参照の先頭要素がホスト名に見えればそれをレジストリとみなす
///
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    match image.split_once('/') {
        Some((host, _)) if host == "localhost" || host.contains(['.', ':']) => host.to_string(),
        _ => DOCKER_HUB_REGISTRY.to_string(),
    }
}

/// config.json を引くときに試すキー
fn registry_keys(registry: &str) -> Vec<String> {
    if registry == DOCKER_HUB_REGISTRY {
        DOCKER_HUB_KEYS.iter().map(|k| k.to_string()).collect()
    } else {
        vec![registry.to_string(), format!("https://{}", registry)]
    }
}

fn credentials(registry: &str, username: String, password: String) -> DockerCredentials {
    DockerCredentials {
        username: Some(username),
        password: Some(password),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }
}

fn auth_failed(registry: &str, message: String) -> EngineError {
    EngineError::AuthFailed {
        registry: registry.to_string(),
        message,
    }
}

/// `auth` フィールド（base64 の "user:password"）を展開する。区切りがなければ None
fn decode_auth(encoded: &str, registry: &str) -> Result<Option<DockerCredentials>> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| auth_failed(registry, format!("auth is not valid base64: {}", e)))?;
    let pair = String::from_utf8(raw)
        .map_err(|e| auth_failed(registry, format!("auth is not valid UTF-8: {}", e)))?;

    Ok(pair
        .split_once(':')
        .map(|(user, password)| credentials(registry, user.to_string(), password.to_string())))
}

/// `docker-credential-<helper> get` にサーバー名を渡して認証情報を得る
fn query_helper(helper: &str, server: &str) -> Result<Option<DockerCredentials>> {
    let program = format!("docker-credential-{}", helper);
    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| auth_failed(server, format!("cannot run {}: {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(server.as_bytes())
            .map_err(|e| auth_failed(server, format!("cannot write to {}: {}", program, e)))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| auth_failed(server, format!("{} did not finish: {}", program, e)))?;

    // 未登録のサーバーは非ゼロ終了で返ってくる
    if !output.status.success() {
        tracing::debug!(
            "{} has no entry for {}: {}",
            program,
            server,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(None);
    }

    let reply: HelperReply = serde_json::from_slice(&output.stdout)
        .map_err(|e| auth_failed(server, format!("unexpected output from {}: {}", program, e)))?;
    Ok(Some(credentials(server, reply.username, reply.secret)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdocker_config::AuthEntry;

    fn config_with(key: &str, user: &str, password: &str) -> DockerCliConfig {
        let auth =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
        let mut config = DockerCliConfig::default();
        config
            .auths
            .insert(key.to_string(), AuthEntry { auth: Some(auth) });
        config
    }

    #[test]
    fn test_extract_registry() {
        assert_eq!(extract_registry("ghcr.io/org/app:v1.0"), "ghcr.io");
        assert_eq!(extract_registry("myuser/app:latest"), "docker.io");
        assert_eq!(extract_registry("nginx:alpine"), "docker.io");
        assert_eq!(extract_registry("localhost:5000/myapp"), "localhost:5000");
        assert_eq!(extract_registry("localhost/myapp"), "localhost");
        assert_eq!(
            extract_registry("123456789.dkr.ecr.ap-northeast-1.amazonaws.com/app"),
            "123456789.dkr.ecr.ap-northeast-1.amazonaws.com"
        );
    }

    #[test]
    fn test_docker_hub_legacy_key() {
        let auth = RegistryAuth::with_config(config_with(
            "https://index.docker.io/v1/",
            "alice",
            "s3cret",
        ));
        let creds = auth.get_credentials("alice/app:1.0").unwrap().unwrap();
        assert_eq!(creds.username.as_deref(), Some("alice"));
        assert_eq!(creds.password.as_deref(), Some("s3cret"));
        assert_eq!(creds.serveraddress.as_deref(), Some("docker.io"));
    }

    #[test]
    fn test_private_registry_key() {
        let auth = RegistryAuth::with_config(config_with("ghcr.io", "bot", "token"));
        let creds = auth.get_credentials("ghcr.io/org/app").unwrap().unwrap();
        assert_eq!(creds.username.as_deref(), Some("bot"));

        assert!(auth.get_credentials("quay.io/org/app").unwrap().is_none());
    }

    #[test]
    fn test_explicit_credentials_win() {
        let auth = RegistryAuth::with_config(config_with("ghcr.io", "bot", "token"));
        let explicit = RegistryCredentials {
            address: "ghcr.io".to_string(),
            username: "human".to_string(),
            password: "pw".to_string(),
        };
        let creds = auth
            .resolve("ghcr.io/org/app", Some(&explicit))
            .unwrap()
            .unwrap();
        assert_eq!(creds.username.as_deref(), Some("human"));
    }

    #[test]
    fn test_invalid_base64_is_error() {
        let mut config = DockerCliConfig::default();
        config.auths.insert(
            "ghcr.io".to_string(),
            AuthEntry {
                auth: Some("!!!".to_string()),
            },
        );
        let auth = RegistryAuth::with_config(config);
        assert!(matches!(
            auth.get_credentials("ghcr.io/org/app"),
            Err(EngineError::AuthFailed { .. })
        ));
    }
}
