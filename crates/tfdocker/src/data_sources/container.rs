//! docker_container データソース

use crate::ProviderData;
use crate::common::{endpoint_addresses, from_hash_map, non_empty};
use bollard::models::ContainerInspectResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{EngineError, OptionalExt};
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ContainerDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ContainerDataModel {
    id: Option<String>,
    name: String,
    image: Option<String>,
    container_id: Option<String>,
    status: Option<String>,
    state: Option<String>,
    ip_address: Option<String>,
    gateway: Option<String>,
    labels: Option<BTreeMap<String, String>>,
    env: Option<Vec<String>>,
    command: Option<Vec<String>>,
}

impl ContainerDataModel {
    fn apply(&mut self, container: ContainerInspectResponse) {
        self.id = container.id.clone();
        self.container_id = container.id;
        if let Some(name) = container.name {
            self.name = name.trim_start_matches('/').to_string();
        }

        if let Some(state) = container.state {
            self.status = state.status.map(|s| s.to_string());
            let running = state.running.unwrap_or(false);
            self.state = Some(if running { "running" } else { "stopped" }.to_string());
        }

        let (ip_address, gateway) = endpoint_addresses(container.network_settings.as_ref());
        self.ip_address = ip_address;
        self.gateway = gateway;

        if let Some(config) = container.config {
            self.image = non_empty(config.image);
            self.labels = from_hash_map(config.labels);
            self.env = config.env;
            self.command = config.cmd;
        }
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a Docker container by name or ID.")
            .attribute(Attribute::computed_string("id").description("The container ID."))
            .attribute(Attribute::required_string("name").description("Name or ID of the container."))
            .attribute(Attribute::computed_string("image").description("The image of the container."))
            .attribute(Attribute::computed_string("container_id").description("The container ID."))
            .attribute(
                Attribute::computed_string("status")
                    .description("Docker status, e.g. running or exited."),
            )
            .attribute(
                Attribute::computed_string("state")
                    .description("running when the container is running, else stopped."),
            )
            .attribute(Attribute::computed_string("ip_address").description("The container IP address."))
            .attribute(Attribute::computed_string("gateway").description("The network gateway."))
            .attribute(Attribute::computed("labels", Type::map(Type::String)).description("Container labels."))
            .attribute(Attribute::computed("env", Type::list(Type::String)).description("Environment in KEY=VALUE form."))
            .attribute(Attribute::computed("command", Type::list(Type::String)).description("The container command.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for ContainerDataSource {
    fn type_name(&self) -> &'static str {
        "docker_container"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ContainerDataModel = decode(config, diags)?;

        match data
            .docker
            .inspect_container(&model.name, None::<bollard::query_parameters::InspectContainerOptions>)
            .await
            .map_err(EngineError::from)
            .optional()
        {
            Ok(Some(container)) => model.apply(container),
            Ok(None) => {
                diags.error(
                    "Container Not Found",
                    format!("Container {} not found", model.name),
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Container Read Error",
                    format!("Unable to read container {}: {}", model.name, e),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerConfig, ContainerState, ContainerStateStatusEnum};

    #[test]
    fn test_apply_inspect() {
        let mut model = ContainerDataModel::default();
        model.apply(ContainerInspectResponse {
            id: Some("f00dcafe".to_string()),
            name: Some("/web".to_string()),
            state: Some(ContainerState {
                status: Some(ContainerStateStatusEnum::EXITED),
                running: Some(false),
                ..Default::default()
            }),
            config: Some(ContainerConfig {
                image: Some("nginx:1.27".to_string()),
                env: Some(vec!["A=1".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(model.name, "web");
        assert_eq!(model.container_id.as_deref(), Some("f00dcafe"));
        assert_eq!(model.status.as_deref(), Some("exited"));
        assert_eq!(model.state.as_deref(), Some("stopped"));
        assert_eq!(model.image.as_deref(), Some("nginx:1.27"));
        assert!(model.ip_address.is_none());
        assert!(model.labels.is_none());
    }
}
