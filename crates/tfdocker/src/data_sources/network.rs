//! docker_network / docker_networks データソース

use crate::ProviderData;
use crate::common::from_hash_map;
use crate::data_sources::object_type;
use bollard::models::Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct NetworkDataSource;

pub struct NetworksDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct NetworkDataModel {
    id: Option<String>,
    name: String,
    driver: Option<String>,
    scope: Option<String>,
    internal: Option<bool>,
    labels: Option<BTreeMap<String, String>>,
    options: Option<BTreeMap<String, String>>,
}

impl From<Network> for NetworkDataModel {
    fn from(network: Network) -> Self {
        Self {
            id: network.id,
            name: network.name.unwrap_or_default(),
            driver: network.driver,
            scope: network.scope,
            internal: Some(network.internal.unwrap_or(false)),
            labels: from_hash_map(network.labels),
            options: from_hash_map(network.options),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct NetworksDataModel {
    id: Option<String>,
    networks: Vec<NetworkDataModel>,
}

fn network_fields() -> Vec<(&'static str, Type)> {
    vec![
        ("id", Type::String),
        ("name", Type::String),
        ("driver", Type::String),
        ("scope", Type::String),
        ("internal", Type::Bool),
        ("labels", Type::map(Type::String)),
        ("options", Type::map(Type::String)),
    ]
}

fn network_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a Docker network by name or ID.")
            .attribute(Attribute::computed_string("id").description("The network ID."))
            .attribute(Attribute::required_string("name").description("Name or ID of the network."))
            .attribute(Attribute::computed_string("driver").description("The network driver."))
            .attribute(Attribute::computed_string("scope").description("The network scope."))
            .attribute(Attribute::computed_bool("internal").description("Whether the network is internal."))
            .attribute(Attribute::computed("labels", Type::map(Type::String)).description("Network labels."))
            .attribute(Attribute::computed("options", Type::map(Type::String)).description("Driver options.")),
    )
}

fn networks_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Lists all Docker networks.")
            .attribute(Attribute::computed_string("id").description("Fixed identifier."))
            .attribute(
                Attribute::computed("networks", Type::list(object_type(network_fields())))
                    .description("All networks on the host."),
            ),
    )
}

#[async_trait]
impl DataSource<ProviderData> for NetworkDataSource {
    fn type_name(&self) -> &'static str {
        "docker_network"
    }

    fn schema(&self) -> Schema {
        network_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let model: NetworkDataModel = decode(config, diags)?;

        match data
            .docker
            .inspect_network(&model.name, None::<bollard::query_parameters::InspectNetworkOptions>)
            .await
        {
            Ok(network) => encode(&NetworkDataModel::from(network), &network_schema(), diags),
            Err(e) => {
                diags.error(
                    "Network Not Found",
                    format!("Unable to read network {}: {}", model.name, e),
                );
                None
            }
        }
    }
}

#[async_trait]
impl DataSource<ProviderData> for NetworksDataSource {
    fn type_name(&self) -> &'static str {
        "docker_networks"
    }

    fn schema(&self) -> Schema {
        networks_schema()
    }

    async fn read(&self, data: &ProviderData, _config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let networks = match data
            .docker
            .list_networks(None::<bollard::query_parameters::ListNetworksOptions>)
            .await
        {
            Ok(networks) => networks,
            Err(e) => {
                diags.error(
                    "Unable to List Networks",
                    format!("Unable to list Docker networks: {}", e),
                );
                return None;
            }
        };

        let model = NetworksDataModel {
            id: Some("docker_networks".to_string()),
            networks: networks.into_iter().map(NetworkDataModel::from).collect(),
        };
        encode(&model, &networks_schema(), diags)
    }
}
