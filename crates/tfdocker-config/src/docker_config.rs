//! Docker CLI の設定ファイル (config.json)

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// config.json のうち認証に関わる部分
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerCliConfig {
    /// レジストリ -> 認証エントリ
    #[serde(default)]
    pub auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    pub creds_store: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthEntry {
    /// Base64 エンコードされた "username:password"
    pub auth: Option<String>,
}

/// config.json のパスを取得
///
/// `DOCKER_CONFIG` があればそのディレクトリ、なければ `~/.docker`
pub fn docker_config_path() -> Result<PathBuf> {
    let dir = match std::env::var("DOCKER_CONFIG") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .ok_or(ConfigError::HomeDirNotFound)?
            .join(".docker"),
    };
    Ok(dir.join("config.json"))
}

impl DockerCliConfig {
    /// config.json を読み込む。存在しなければ空の設定を返す
    pub fn load() -> Result<Self> {
        let path = docker_config_path()?;
        if !path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::DockerConfigParse(e.to_string()))
    }
}
