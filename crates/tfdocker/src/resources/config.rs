//! docker_config: Swarm コンフィグ

use crate::ProviderData;
use crate::common::{from_hash_map, to_hash_map};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bollard::models::ConfigSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{OptionalExt, ignore_not_found};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ConfigResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigModel {
    id: Option<String>,
    name: String,
    data: Option<String>,
    labels: Option<BTreeMap<String, String>>,
}

impl ConfigModel {
    fn spec(&self, with_data: bool) -> ConfigSpec {
        ConfigSpec {
            name: Some(self.name.clone()),
            labels: to_hash_map(&self.labels),
            data: self
                .data
                .as_ref()
                .filter(|_| with_data)
                .map(|data| STANDARD.encode(data)),
            ..Default::default()
        }
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a Docker Swarm config.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The config ID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the config.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("data")
                    .description("The config content.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional("labels", Type::map(Type::String))
                    .description("User-defined key/value metadata."),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for ConfigResource {
    fn type_name(&self) -> &'static str {
        "docker_config"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ConfigModel = decode(plan, diags)?;
        tracing::debug!("Creating Docker config {}", model.name);

        match data.api.create_config(&model.spec(true)).await {
            Ok(id) => model.id = Some(id),
            Err(e) => {
                diags.error(
                    "Docker Config Create Failed",
                    format!("Failed to create config {}: {}", model.name, e),
                );
                return None;
            }
        }

        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ConfigModel = decode(state, diags)?;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        let config = match data.api.inspect_config(&id).await.optional() {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::debug!("Config {} not found, removing from state", id);
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Config Read Failed",
                    format!("Failed to read config {}: {}", id, e),
                );
                return None;
            }
        };

        model.id = config.id.or(model.id);
        if let Some(spec) = config.spec {
            if let Some(name) = spec.name {
                model.name = name;
            }
            model.labels = from_hash_map(spec.labels);
            // コンフィグは内容を返すので、インポート後もここで埋まる
            if let Some(decoded) = spec
                .data
                .and_then(|encoded| STANDARD.decode(encoded).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                model.data = Some(decoded);
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: ConfigModel = decode(plan, diags)?;
        let prior: ConfigModel = decode(prior, diags)?;
        model.id = prior.id;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        let version = match data.api.inspect_config(&id).await {
            Ok(config) => config.version.and_then(|v| v.index).unwrap_or_default(),
            Err(e) => {
                diags.error(
                    "Docker Config Update Failed",
                    format!("Failed to inspect config {}: {}", id, e),
                );
                return None;
            }
        };

        if let Err(e) = data.api.update_config(&id, version, &model.spec(false)).await {
            diags.error(
                "Docker Config Update Failed",
                format!("Failed to update config {}: {}", id, e),
            );
            return None;
        }

        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<ConfigModel>(state, diags) else {
            return;
        };
        let id = model.id.unwrap_or(model.name);

        match ignore_not_found(data.api.delete_config(&id).await) {
            Ok(()) => tracing::debug!("Deleted Docker config {}", id),
            Err(e) => diags.error(
                "Docker Config Delete Failed",
                format!("Failed to delete config {}: {}", id, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = ConfigModel {
            id: Some(id.to_string()),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
