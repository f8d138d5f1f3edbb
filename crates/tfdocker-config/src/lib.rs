//! プロバイダー設定の解決
//!
//! provider ブロックの属性・環境変数・既定値を
//! 「明示的な属性 > 環境変数 > 既定値」の優先順位で解決する。

pub mod docker_config;
pub mod error;
pub mod tls;

pub use docker_config::*;
pub use error::*;
pub use tls::*;

use serde::Deserialize;

/// Docker Engine の既定の接続先
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// provider ブロックに書かれた値（未指定は None）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderAttributes {
    pub host: Option<String>,
    pub tls_verify: Option<bool>,
    pub cert_path: Option<String>,
    pub ca_cert: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub hub_username: Option<String>,
    pub hub_password: Option<String>,
    pub hub_token: Option<String>,
}

/// 解決済みのプロバイダー設定
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub docker: DockerEndpoint,
    /// 認証情報が揃っている場合のみ Some
    pub hub: Option<HubCredentials>,
}

/// Docker Engine への接続設定
#[derive(Debug, Clone, PartialEq)]
pub struct DockerEndpoint {
    pub host: String,
    pub tls: Option<TlsMaterial>,
}

/// Docker Hub の認証情報
#[derive(Debug, Clone, PartialEq)]
pub struct HubCredentials {
    pub username: String,
    pub secret: HubSecret,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubSecret {
    /// Personal Access Token。そのまま Bearer として使う
    Token(String),
    /// パスワード。ログインして JWT を取得する
    Password(String),
}

impl ProviderConfig {
    /// 属性と環境変数から設定を解決
    pub fn resolve(attrs: &ProviderAttributes) -> Result<Self> {
        let host = attribute_or_env(&attrs.host, "DOCKER_HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string());

        let tls_verify = attrs
            .tls_verify
            .unwrap_or_else(|| std::env::var("DOCKER_TLS_VERIFY").is_ok_and(|v| v == "1"));

        let tls = if tls_verify {
            Some(resolve_tls(attrs)?)
        } else {
            None
        };

        Ok(Self {
            docker: DockerEndpoint { host, tls },
            hub: resolve_hub(attrs),
        })
    }
}

/// 属性が null なら環境変数を参照
fn attribute_or_env(attr: &Option<String>, env: &str) -> Option<String> {
    match attr {
        Some(value) => Some(value.clone()),
        None => std::env::var(env).ok(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn resolve_tls(attrs: &ProviderAttributes) -> Result<TlsMaterial> {
    // PEM の中身が揃っていればそちらを優先
    if let (Some(ca), Some(cert), Some(key)) = (
        non_empty(&attrs.ca_cert),
        non_empty(&attrs.cert),
        non_empty(&attrs.key),
    ) {
        return Ok(TlsMaterial::Pem {
            ca: ca.to_string(),
            cert: cert.to_string(),
            key: key.to_string(),
        });
    }

    match attribute_or_env(&attrs.cert_path, "DOCKER_CERT_PATH").filter(|p| !p.is_empty()) {
        Some(path) => Ok(TlsMaterial::CertPath(path.into())),
        None => Err(ConfigError::MissingTlsConfiguration),
    }
}

fn resolve_hub(attrs: &ProviderAttributes) -> Option<HubCredentials> {
    let username = attribute_or_env(&attrs.hub_username, "DOCKER_HUB_USERNAME")
        .filter(|u| !u.is_empty())?;
    let password =
        attribute_or_env(&attrs.hub_password, "DOCKER_HUB_PASSWORD").filter(|p| !p.is_empty());
    let token = attribute_or_env(&attrs.hub_token, "DOCKER_HUB_TOKEN").filter(|t| !t.is_empty());

    let secret = match (token, password) {
        (Some(token), _) => HubSecret::Token(token),
        (None, Some(password)) => HubSecret::Password(password),
        (None, None) => {
            tracing::debug!("Docker Hub のユーザー名のみ指定されているため Hub クライアントは作成しません");
            return None;
        }
    };

    Some(HubCredentials { username, secret })
}
