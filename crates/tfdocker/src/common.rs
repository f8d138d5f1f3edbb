//! リソース・データソース共通の補助

use bollard::auth::DockerCredentials;
use bollard::models::{HealthConfig, NetworkSettings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tfdocker_engine::auth::extract_registry;
use tfdocker_engine::{RegistryAuth, RegistryCredentials, parse_nanos};
use tfdocker_plugin::{Attribute, Block, Diagnostics, NestedBlock, Type};

/// `/` 区切りのインポート ID を分解する
///
/// 要素数が違う、または空の要素がある場合は "Invalid Import ID" を記録する。
pub fn split_import_id(
    id: &str,
    expected: usize,
    format: &str,
    diags: &mut Diagnostics,
) -> Option<Vec<String>> {
    let parts: Vec<String> = id.split('/').map(str::to_string).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        diags.error(
            "Invalid Import ID",
            format!("Expected import ID in the format '{}', got: {}", format, id),
        );
        return None;
    }
    Some(parts)
}

/// Terraform の map 属性を Docker API 用の HashMap に変換
pub fn to_hash_map(map: &Option<BTreeMap<String, String>>) -> Option<HashMap<String, String>> {
    map.as_ref()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Docker API の map を state 用に変換。空の map は null として扱う
pub fn from_hash_map(map: Option<HashMap<String, String>>) -> Option<BTreeMap<String, String>> {
    map.filter(|m| !m.is_empty())
        .map(|m| m.into_iter().collect())
}

/// 空文字列を None にする
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `registry_auth` / `auth_config` / `auth` ブロック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryAuthModel {
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RegistryAuthModel {
    /// ユーザー名があるときだけ認証情報にする。アドレス省略時はイメージ名から推定
    pub fn credentials(&self, image: &str) -> Option<RegistryCredentials> {
        let username = self.username.clone().filter(|u| !u.is_empty())?;
        Some(RegistryCredentials {
            address: self
                .address
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| extract_registry(image)),
            username,
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

pub fn registry_auth_block(name: &str, description: &str) -> NestedBlock {
    NestedBlock::single(
        name,
        Block::new()
            .description(description)
            .attribute(
                Attribute::optional_string("address")
                    .description("The address of the registry (e.g., docker.io, ghcr.io)."),
            )
            .attribute(
                Attribute::optional_string("username")
                    .description("The username for registry authentication."),
            )
            .attribute(
                Attribute::optional_string("password")
                    .description("The password for registry authentication.")
                    .sensitive(),
            ),
    )
}

/// 明示された認証情報、なければ Docker の config.json から認証情報を解決する
///
/// config.json が読めない場合は警告ログだけ出して認証なしで続行する。
pub fn resolve_registry_credentials(
    image: &str,
    auth: Option<&RegistryAuthModel>,
    diags: &mut Diagnostics,
) -> Option<Option<DockerCredentials>> {
    let explicit = auth.and_then(|a| a.credentials(image));

    let registry_auth = match RegistryAuth::load() {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!("Failed to load Docker config: {}", e);
            RegistryAuth::default()
        }
    };

    match registry_auth.resolve(image, explicit.as_ref()) {
        Ok(creds) => Some(creds),
        Err(e) => {
            diags.error(
                "Registry Auth Error",
                format!("Failed to resolve registry credentials for {}: {}", image, e),
            );
            None
        }
    }
}

/// コンテナが接続しているネットワークから IP アドレスとゲートウェイを取得
///
/// ネットワーク名順に見て、最初にアドレスを持つエンドポイントを使う。
pub fn endpoint_addresses(settings: Option<&NetworkSettings>) -> (Option<String>, Option<String>) {
    let Some(networks) = settings.and_then(|s| s.networks.as_ref()) else {
        return (None, None);
    };

    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();

    for name in names {
        let endpoint = &networks[name];
        if let Some(ip) = non_empty(endpoint.ip_address.clone()) {
            return (Some(ip), non_empty(endpoint.gateway.clone()));
        }
    }
    (None, None)
}

/// `healthcheck` ブロック（docker_container / docker_service 共通）
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthcheckModel {
    pub test: Vec<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub start_period: Option<String>,
    pub retries: Option<i64>,
}

impl HealthcheckModel {
    pub fn to_config(&self) -> Result<HealthConfig, String> {
        Ok(HealthConfig {
            test: Some(self.test.clone()),
            interval: duration_nanos("healthcheck.interval", &self.interval)?,
            timeout: duration_nanos("healthcheck.timeout", &self.timeout)?,
            start_period: duration_nanos("healthcheck.start_period", &self.start_period)?,
            retries: self.retries,
            ..Default::default()
        })
    }
}

/// `replace` を付けると全属性が再作成扱いになる
pub fn healthcheck_block(replace: bool) -> NestedBlock {
    let attribute = |a: Attribute| if replace { a.requires_replace() } else { a };
    NestedBlock::single(
        "healthcheck",
        Block::new()
            .description("A test to perform to check that the container is healthy.")
            .attribute(attribute(
                Attribute::required("test", Type::list(Type::String))
                    .description("Command to run to check health."),
            ))
            .attribute(attribute(
                Attribute::optional_string("interval")
                    .description("Time between running the check. Default is 30s.")
                    .with_default("30s"),
            ))
            .attribute(attribute(
                Attribute::optional_string("timeout")
                    .description("Maximum time to allow one check to run. Default is 30s.")
                    .with_default("30s"),
            ))
            .attribute(attribute(
                Attribute::optional_string("start_period")
                    .description("Start period for the container to initialize. Default is 0s.")
                    .with_default("0s"),
            ))
            .attribute(attribute(
                Attribute::optional_number("retries")
                    .description("Consecutive failures needed to report unhealthy. Default is 3.")
                    .with_default(3i64),
            )),
    )
}

/// Go 形式の期間指定をナノ秒に。未指定と空文字列は None
pub fn duration_nanos(field: &str, value: &Option<String>) -> Result<Option<i64>, String> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => parse_nanos(s)
            .map(Some)
            .map_err(|e| format!("{}: {}", field, e)),
    }
}

/// デーモンに接続しない ProviderData（テスト用）。接続は最初の API 呼び出しまで行われない
#[cfg(test)]
pub fn offline_data() -> crate::ProviderData {
    let docker = tfdocker_engine::Docker::connect_with_http(
        "http://127.0.0.1:9",
        1,
        bollard::API_DEFAULT_VERSION,
    )
    .unwrap();
    let api = tfdocker_engine::EngineApi::new(&tfdocker_config::DockerEndpoint {
        host: "tcp://127.0.0.1:9".to_string(),
        tls: None,
    })
    .unwrap();
    crate::ProviderData {
        docker,
        api,
        hub: None,
    }
}
