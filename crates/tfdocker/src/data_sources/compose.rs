//! docker_compose データソース
//!
//! プロジェクトラベルの付いたコンテナをサービスごとにまとめて返す。

use crate::ProviderData;
use crate::data_sources::object_type;
use serde::{Deserialize, Serialize};
use tfdocker_engine::{ComposeProject, ServiceStatus};
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ComposeDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ComposeDataModel {
    id: Option<String>,
    project_name: String,
    services: Vec<ServiceInfo>,
    running_services: Option<i64>,
    total_services: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ServiceInfo {
    name: String,
    container_id: String,
    state: String,
    status: String,
    health: Option<String>,
    image: String,
    ports: String,
}

impl From<ServiceStatus> for ServiceInfo {
    fn from(status: ServiceStatus) -> Self {
        Self {
            name: status.name,
            container_id: status.container_id,
            state: status.state,
            status: status.status,
            health: status.health,
            image: status.image,
            ports: status.ports,
        }
    }
}

fn schema() -> Schema {
    let service = object_type(vec![
        ("name", Type::String),
        ("container_id", Type::String),
        ("state", Type::String),
        ("status", Type::String),
        ("health", Type::String),
        ("image", Type::String),
        ("ports", Type::String),
    ]);

    Schema::new(
        Block::new()
            .description("Reads the status of a Docker Compose project.")
            .attribute(Attribute::computed_string("id").description("The project name."))
            .attribute(Attribute::required_string("project_name").description("The Compose project name."))
            .attribute(
                Attribute::computed("services", Type::list(service))
                    .description("Services of the project, sorted by name."),
            )
            .attribute(
                Attribute::computed_number("running_services")
                    .description("Number of services with a running container."),
            )
            .attribute(Attribute::computed_number("total_services").description("Number of services.")),
    )
}

fn summarize(project_name: &str, statuses: Vec<ServiceStatus>) -> ComposeDataModel {
    let services: Vec<ServiceInfo> = statuses.into_iter().map(ServiceInfo::from).collect();
    let running = services.iter().filter(|s| s.state == "running").count();

    ComposeDataModel {
        id: Some(project_name.to_string()),
        project_name: project_name.to_string(),
        running_services: Some(running as i64),
        total_services: Some(services.len() as i64),
        services,
    }
}

#[async_trait]
impl DataSource<ProviderData> for ComposeDataSource {
    fn type_name(&self) -> &'static str {
        "docker_compose"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let config: ComposeDataModel = decode(config, diags)?;

        let project = ComposeProject::new(&data.docker, &config.project_name);
        let statuses = match project.service_statuses().await {
            Ok(statuses) => statuses,
            Err(e) => {
                diags.error(
                    "Compose Status Error",
                    format!(
                        "Unable to list containers of project {}: {}",
                        config.project_name, e
                    ),
                );
                return None;
            }
        };

        encode(&summarize(&config.project_name, statuses), &schema(), diags)
    }
}
