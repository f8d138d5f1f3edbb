//! docker_network

use crate::ProviderData;
use crate::common::{from_hash_map, to_hash_map};
use bollard::models::{Ipam, IpamConfig, NetworkCreateRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{EngineError, OptionalExt};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, NestedBlock, Resource, Schema, Type, Value, async_trait,
    decode, encode,
};

pub struct NetworkResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct NetworkModel {
    id: Option<String>,
    name: String,
    driver: Option<String>,
    internal: bool,
    attachable: bool,
    ingress: bool,
    ipv6: bool,
    labels: Option<BTreeMap<String, String>>,
    options: Option<BTreeMap<String, String>>,
    scope: Option<String>,
    ipam: Option<IpamModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct IpamModel {
    driver: Option<String>,
    options: Option<BTreeMap<String, String>>,
    config: Vec<IpamConfigModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct IpamConfigModel {
    subnet: Option<String>,
    ip_range: Option<String>,
    gateway: Option<String>,
    aux_address: Option<BTreeMap<String, String>>,
}

fn flag(name: &str, description: &str) -> Attribute {
    Attribute::optional_bool(name)
        .description(description)
        .with_default(false)
        .requires_replace()
}

fn schema() -> Schema {
    let string_map = Type::map(Type::String);

    Schema::new(
        Block::new()
            .description("Manages Docker networks.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The ID of the network.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the Docker network.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_string("driver")
                    .description("The network driver (bridge, host, overlay, macvlan). Default is bridge.")
                    .with_default("bridge")
                    .requires_replace(),
            )
            .attribute(flag("internal", "Restrict external access to the network."))
            .attribute(flag("attachable", "Allow manual container attachment."))
            .attribute(flag("ingress", "Create a Swarm routing-mesh network."))
            .attribute(flag("ipv6", "Enable IPv6 networking."))
            .attribute(
                Attribute::optional("labels", string_map.clone())
                    .description("User-defined key/value metadata."),
            )
            .attribute(
                Attribute::optional("options", string_map.clone())
                    .description("Driver-specific options.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::computed_string("scope")
                    .description("The scope of the network (local, swarm, global).")
                    .use_state_for_unknown(),
            )
            .block(
                NestedBlock::single(
                    "ipam",
                    Block::new()
                        .description("IP address management configuration.")
                        .attribute(
                            Attribute::optional_string("driver")
                                .description("IPAM driver. Default is 'default'.")
                                .with_default("default"),
                        )
                        .attribute(
                            Attribute::optional("options", string_map.clone())
                                .description("IPAM driver options."),
                        )
                        .block(NestedBlock::list(
                            "config",
                            Block::new()
                                .attribute(
                                    Attribute::optional_string("subnet")
                                        .description("The subnet in CIDR form."),
                                )
                                .attribute(
                                    Attribute::optional_string("ip_range")
                                        .description("The IP range within the subnet."),
                                )
                                .attribute(
                                    Attribute::optional_string("gateway")
                                        .description("The gateway for the subnet."),
                                )
                                .attribute(
                                    Attribute::optional("aux_address", string_map)
                                        .description("Auxiliary addresses for the network."),
                                ),
                        )),
                )
                .requires_replace(),
            ),
    )
}

fn create_request(model: &NetworkModel) -> NetworkCreateRequest {
    let ipam = model.ipam.as_ref().map(|ipam| Ipam {
        driver: ipam.driver.clone(),
        options: to_hash_map(&ipam.options),
        config: Some(
            ipam.config
                .iter()
                .map(|c| IpamConfig {
                    subnet: c.subnet.clone(),
                    ip_range: c.ip_range.clone(),
                    gateway: c.gateway.clone(),
                    auxiliary_addresses: to_hash_map(&c.aux_address),
                })
                .collect(),
        ),
    });

    NetworkCreateRequest {
        name: model.name.clone(),
        driver: model.driver.clone(),
        internal: Some(model.internal),
        attachable: Some(model.attachable),
        ingress: Some(model.ingress),
        enable_ipv6: Some(model.ipv6),
        labels: to_hash_map(&model.labels),
        options: to_hash_map(&model.options),
        ipam,
        ..Default::default()
    }
}

/// inspect して計算値を反映。存在しなければ false
async fn refresh(data: &ProviderData, model: &mut NetworkModel, id: &str) -> Result<bool, EngineError> {
    let Some(network) = data
        .docker
        .inspect_network(id, None::<bollard::query_parameters::InspectNetworkOptions>)
        .await
        .map_err(EngineError::from)
        .optional()?
    else {
        return Ok(false);
    };

    model.id = network.id.or(model.id.take());
    if let Some(name) = network.name {
        model.name = name;
    }
    model.driver = network.driver.or(model.driver.take());
    model.internal = network.internal.unwrap_or(model.internal);
    model.attachable = network.attachable.unwrap_or(model.attachable);
    model.ingress = network.ingress.unwrap_or(model.ingress);
    model.ipv6 = network.enable_ipv6.unwrap_or(model.ipv6);
    model.scope = network.scope;
    if let Some(labels) = from_hash_map(network.labels) {
        model.labels = Some(labels);
    }
    if let Some(options) = from_hash_map(network.options) {
        model.options = Some(options);
    }
    Ok(true)
}

#[async_trait]
impl Resource<ProviderData> for NetworkResource {
    fn type_name(&self) -> &'static str {
        "docker_network"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: NetworkModel = decode(plan, diags)?;
        tracing::debug!("Creating Docker network {}", model.name);

        if let Err(e) = data.docker.create_network(create_request(&model)).await {
            diags.error(
                "Network Create Error",
                format!("Unable to create network {}: {}", model.name, e),
            );
            return None;
        }

        let name = model.name.clone();
        match refresh(data, &mut model, &name).await {
            Ok(true) => {}
            Ok(false) => {
                diags.error(
                    "Network Inspect Error",
                    format!("Network {} disappeared right after creation", name),
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Network Inspect Error",
                    format!("Unable to inspect network {}: {}", name, e),
                );
                return None;
            }
        }

        tracing::debug!("Created Docker network {} ({:?})", model.name, model.id);
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: NetworkModel = decode(state, diags)?;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        match refresh(data, &mut model, &id).await {
            Ok(true) => encode(&model, &schema(), diags),
            Ok(false) => {
                tracing::debug!("Network {} is gone, removing from state", id);
                None
            }
            Err(e) => {
                diags.error(
                    "Network Read Error",
                    format!("Unable to read network {}: {}", id, e),
                );
                None
            }
        }
    }

    async fn update(
        &self,
        _data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        // ラベル変更は Docker API で反映できないため state のみ更新
        let mut model: NetworkModel = decode(plan, diags)?;
        let prior: NetworkModel = decode(prior, diags)?;
        model.id = prior.id;
        model.scope = prior.scope;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<NetworkModel>(state, diags) else {
            return;
        };
        let id = model.id.unwrap_or(model.name);
        tracing::debug!("Deleting Docker network {}", id);

        match data.docker.remove_network(&id).await.map_err(EngineError::from) {
            Ok(()) => tracing::debug!("Deleted Docker network {}", id),
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Network Delete Error",
                format!("Unable to delete network {}: {}", id, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = NetworkModel {
            id: Some(id.to_string()),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request() {
        let model = NetworkModel {
            name: "backend".to_string(),
            driver: Some("bridge".to_string()),
            internal: true,
            labels: Some(BTreeMap::from([("env".to_string(), "dev".to_string())])),
            ipam: Some(IpamModel {
                driver: Some("default".to_string()),
                options: None,
                config: vec![IpamConfigModel {
                    subnet: Some("10.10.0.0/16".to_string()),
                    gateway: Some("10.10.0.1".to_string()),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };

        let request = create_request(&model);
        assert_eq!(request.name, "backend");
        assert_eq!(request.internal, Some(true));
        assert_eq!(request.enable_ipv6, Some(false));
        assert_eq!(request.labels.unwrap()["env"], "dev");

        let config = request.ipam.unwrap().config.unwrap();
        assert_eq!(config[0].subnet.as_deref(), Some("10.10.0.0/16"));
        assert_eq!(config[0].gateway.as_deref(), Some("10.10.0.1"));
    }

    #[test]
    fn test_model_from_plan_value() {
        let plan = Value::object([
            ("name", Value::string("backend")),
            ("driver", Value::string("overlay")),
            ("attachable", Value::Bool(true)),
            ("id", Value::Unknown),
        ]);
        let mut diags = Diagnostics::new();
        let model: NetworkModel = decode(&plan, &mut diags).unwrap();
        assert_eq!(model.driver.as_deref(), Some("overlay"));
        assert!(model.attachable);
        assert!(model.id.is_none());
        assert!(model.ipam.is_none());
    }
}
