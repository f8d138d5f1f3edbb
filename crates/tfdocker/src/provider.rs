//! プロバイダー定義
//!
//! provider ブロックを解決して Docker Engine と Docker Hub のクライアントを作り、
//! 全リソース・データソースに [`ProviderData`] として渡す。

use crate::{data_sources, resources};
use std::sync::Arc;
use tfdocker_config::{ConfigError, HubCredentials, HubSecret, ProviderAttributes, ProviderConfig};
use tfdocker_engine::{Docker, EngineApi};
use tfdocker_hub::HubClient;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Provider, Resource, Schema, Value, async_trait,
    decode,
};

/// Terraform レジストリ上のアドレス
pub const PROVIDER_ADDRESS: &str = "registry.terraform.io/chronista-club/docker";

const CLIENT_ERROR_PREFIX: &str = "An unexpected error occurred when creating the Docker client. \
If the error is not clear, please contact the provider developers.\n\nDocker Client Error: ";

/// リソースとデータソースが共有するクライアント
pub struct ProviderData {
    pub docker: Docker,
    /// Bollard にないエンドポイント（Swarm コンフィグ、プラグイン）用
    pub api: EngineApi,
    /// Hub の認証情報がない、または認証に失敗した場合は None
    pub hub: Option<HubClient>,
}

impl ProviderData {
    /// Hub クライアント。未設定なら "Docker Hub Not Configured" を記録する
    pub fn hub(&self, diags: &mut Diagnostics) -> Option<&HubClient> {
        if self.hub.is_none() {
            diags.error(
                "Docker Hub Not Configured",
                "Docker Hub credentials are required for this resource. Set hub_username \
                 together with hub_password or hub_token in the provider configuration.",
            );
        }
        self.hub.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct DockerProvider;

impl DockerProvider {
    pub fn new() -> Self {
        Self
    }
}

pub fn provider_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manage Docker Engine, Docker Swarm and Docker Hub objects.")
            .attribute(Attribute::optional_string("host").description(
                "Docker daemon address (unix://, tcp://, http:// or https://). \
                 Defaults to DOCKER_HOST or unix:///var/run/docker.sock.",
            ))
            .attribute(
                Attribute::optional_bool("tls_verify")
                    .description("Enable TLS verification. Defaults to DOCKER_TLS_VERIFY."),
            )
            .attribute(Attribute::optional_string("cert_path").description(
                "Directory containing ca.pem, cert.pem and key.pem. Defaults to DOCKER_CERT_PATH.",
            ))
            .attribute(
                Attribute::optional_string("ca_cert")
                    .description("PEM-encoded CA certificate.")
                    .sensitive(),
            )
            .attribute(
                Attribute::optional_string("cert")
                    .description("PEM-encoded client certificate.")
                    .sensitive(),
            )
            .attribute(
                Attribute::optional_string("key")
                    .description("PEM-encoded client private key.")
                    .sensitive(),
            )
            .attribute(
                Attribute::optional_string("hub_username")
                    .description("Docker Hub username. Defaults to DOCKER_HUB_USERNAME."),
            )
            .attribute(
                Attribute::optional_string("hub_password")
                    .description("Docker Hub password. Defaults to DOCKER_HUB_PASSWORD.")
                    .sensitive(),
            )
            .attribute(
                Attribute::optional_string("hub_token")
                    .description(
                        "Docker Hub personal access token. Takes precedence over hub_password. \
                         Defaults to DOCKER_HUB_TOKEN.",
                    )
                    .sensitive(),
            ),
    )
}

/// Hub クライアントを作成。パスワードの場合はログインしてトークンを得る
async fn hub_client(credentials: &HubCredentials) -> tfdocker_hub::Result<HubClient> {
    let client = HubClient::new()?;
    match &credentials.secret {
        HubSecret::Token(token) => Ok(client.with_token(&credentials.username, token)),
        HubSecret::Password(password) => client.login(&credentials.username, password).await,
    }
}

#[async_trait]
impl Provider for DockerProvider {
    type Data = ProviderData;

    fn type_name(&self) -> &'static str {
        "docker"
    }

    fn schema(&self) -> Schema {
        provider_schema()
    }

    async fn configure(&self, config: &Value, diags: &mut Diagnostics) -> Option<ProviderData> {
        let attrs: ProviderAttributes = decode(config, diags)?;

        let resolved = match ProviderConfig::resolve(&attrs) {
            Ok(resolved) => resolved,
            Err(ConfigError::MissingTlsConfiguration) => {
                diags.attribute_error(
                    "tls_verify",
                    "Missing TLS Configuration",
                    "When tls_verify is enabled, you must provide either cert_path or all of \
                     ca_cert, cert, and key.",
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Unable to Create Docker Client",
                    format!("{}{}", CLIENT_ERROR_PREFIX, e),
                );
                return None;
            }
        };

        let docker = match tfdocker_engine::connect(&resolved.docker).await {
            Ok(docker) => docker,
            Err(e) => {
                diags.error(
                    "Unable to Create Docker Client",
                    format!("{}{}", CLIENT_ERROR_PREFIX, e),
                );
                return None;
            }
        };
        tracing::info!("Connected to Docker Engine at {}", resolved.docker.host);

        let api = match EngineApi::new(&resolved.docker) {
            Ok(api) => api,
            Err(e) => {
                diags.error(
                    "Unable to Create Docker Client",
                    format!("{}{}", CLIENT_ERROR_PREFIX, e),
                );
                return None;
            }
        };

        let hub = match &resolved.hub {
            Some(credentials) => match hub_client(credentials).await {
                Ok(client) => {
                    tracing::info!("Docker Hub client initialized for {}", credentials.username);
                    Some(client)
                }
                Err(e) => {
                    tracing::warn!("Failed to create Docker Hub client: {}", e);
                    diags.warning(
                        "Docker Hub Authentication Failed",
                        format!(
                            "Failed to authenticate with Docker Hub: {}\nDocker Hub resources will not be available.",
                            e
                        ),
                    );
                    None
                }
            },
            None => None,
        };

        Some(ProviderData {
            docker,
            api,
            hub,
        })
    }

    fn resources(&self) -> Vec<Arc<dyn Resource<ProviderData>>> {
        resources::all()
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSource<ProviderData>>> {
        data_sources::all()
    }
}
