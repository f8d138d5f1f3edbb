//! docker_secret: Swarm シークレット
//!
//! Docker は作成後にシークレットの内容を返さないため、`data` は
//! state に残した値をそのまま使う。

use crate::ProviderData;
use crate::common::{from_hash_map, to_hash_map};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bollard::models::SecretSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{EngineError, OptionalExt, ignore_not_found};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct SecretResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SecretModel {
    id: Option<String>,
    name: String,
    data: Option<String>,
    labels: Option<BTreeMap<String, String>>,
}

impl SecretModel {
    fn spec(&self, with_data: bool) -> SecretSpec {
        SecretSpec {
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
            .description("Manages a Docker Swarm secret.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The secret ID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the secret.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("data")
                    .description("The secret content. Never returned by Docker after creation.")
                    .sensitive()
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional("labels", Type::map(Type::String))
                    .description("User-defined key/value metadata."),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for SecretResource {
    fn type_name(&self) -> &'static str {
        "docker_secret"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: SecretModel = decode(plan, diags)?;
        tracing::debug!("Creating Docker secret {}", model.name);

        match data.docker.create_secret(model.spec(true)).await {
            Ok(response) => model.id = Some(response.id),
            Err(e) => {
                diags.error(
                    "Docker Secret Create Failed",
                    format!("Failed to create secret {}: {}", model.name, e),
                );
                return None;
            }
        }

        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: SecretModel = decode(state, diags)?;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        let secret = match data
            .docker
            .inspect_secret(&id)
            .await
            .map_err(EngineError::from)
            .optional()
        {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                tracing::debug!("Secret {} not found, removing from state", id);
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Secret Read Failed",
                    format!("Failed to read secret {}: {}", id, e),
                );
                return None;
            }
        };

        model.id = secret.id.or(model.id);
        if let Some(spec) = secret.spec {
            if let Some(name) = spec.name {
                model.name = name;
            }
            model.labels = from_hash_map(spec.labels);
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
        let mut model: SecretModel = decode(plan, diags)?;
        let prior: SecretModel = decode(prior, diags)?;
        model.id = prior.id;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        // ラベルだけが更新対象。現在のバージョンが必要
        let version = match data.docker.inspect_secret(&id).await {
            Ok(secret) => secret.version.and_then(|v| v.index).unwrap_or_default(),
            Err(e) => {
                diags.error(
                    "Docker Secret Update Failed",
                    format!("Failed to inspect secret {}: {}", id, e),
                );
                return None;
            }
        };

        let options = bollard::query_parameters::UpdateSecretOptionsBuilder::new()
            .version(version as i64)
            .build();
        if let Err(e) = data
            .docker
            .update_secret(&id, model.spec(false), options)
            .await
        {
            diags.error(
                "Docker Secret Update Failed",
                format!("Failed to update secret {}: {}", id, e),
            );
            return None;
        }

        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<SecretModel>(state, diags) else {
            return;
        };
        let id = model.id.unwrap_or(model.name);

        match ignore_not_found(data.docker.delete_secret(&id).await.map_err(EngineError::from)) {
            Ok(()) => tracing::debug!("Deleted Docker secret {}", id),
            Err(e) => diags.error(
                "Docker Secret Delete Failed",
                format!("Failed to delete secret {}: {}", id, e),
            ),
        }
    }

    /// ID または名前でインポート。内容は設定側で与える必要がある
    async fn import(&self, data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let secret = match data.docker.inspect_secret(id).await {
            Ok(secret) => secret,
            Err(e) => {
                diags.error(
                    "Docker Secret Import Failed",
                    format!(
                        "Failed to import secret {}: {}. Note: Secret data cannot be imported as it is never exposed after creation.",
                        id, e
                    ),
                );
                return None;
            }
        };

        let model = SecretModel {
            id: secret.id.or_else(|| Some(id.to_string())),
            name: secret
                .spec
                .and_then(|spec| spec.name)
                .unwrap_or_else(|| id.to_string()),
            ..Default::default()
        };
        diags.warning(
            "Secret Data Required",
            "The secret data must be provided in the Terraform configuration as Docker does not expose secret data after creation.",
        );
        encode(&model, &schema(), diags)
    }
}
