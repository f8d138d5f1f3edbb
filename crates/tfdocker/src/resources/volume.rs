//! docker_volume

use crate::ProviderData;
use crate::common::{from_hash_map, to_hash_map};
use bollard::models::VolumeCreateOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{EngineError, OptionalExt};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct VolumeResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct VolumeModel {
    id: Option<String>,
    name: String,
    driver: Option<String>,
    driver_opts: Option<BTreeMap<String, String>>,
    labels: Option<BTreeMap<String, String>>,
    mountpoint: Option<String>,
    force: bool,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages Docker volumes.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The volume name.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the Docker volume.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_string("driver")
                    .description("The driver that this volume uses. Default is 'local'.")
                    .with_default("local")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional("driver_opts", Type::map(Type::String))
                    .description("Options specific to the volume driver.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional("labels", Type::map(Type::String))
                    .description("User-defined key/value metadata.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::computed_string("mountpoint")
                    .description("The mount point of the volume on the host.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::optional_bool("force")
                    .description("Force the removal of the volume even if it is in use. Default is false.")
                    .with_default(false),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for VolumeResource {
    fn type_name(&self) -> &'static str {
        "docker_volume"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: VolumeModel = decode(plan, diags)?;
        tracing::debug!("Creating Docker volume {}", model.name);

        let volume = match data
            .docker
            .create_volume(VolumeCreateOptions {
                name: Some(model.name.clone()),
                driver: model.driver.clone(),
                driver_opts: to_hash_map(&model.driver_opts),
                labels: to_hash_map(&model.labels),
                ..Default::default()
            })
            .await
        {
            Ok(volume) => volume,
            Err(e) => {
                diags.error(
                    "Volume Create Error",
                    format!("Unable to create volume {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.id = Some(volume.name.clone());
        model.name = volume.name;
        model.mountpoint = Some(volume.mountpoint);

        tracing::debug!("Created Docker volume {}", model.name);
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: VolumeModel = decode(state, diags)?;

        let volume = match data
            .docker
            .inspect_volume(&model.name)
            .await
            .map_err(EngineError::from)
            .optional()
        {
            Ok(Some(volume)) => volume,
            Ok(None) => {
                tracing::debug!("Volume {} is gone, removing from state", model.name);
                return None;
            }
            Err(e) => {
                diags.error(
                    "Volume Read Error",
                    format!("Unable to read volume {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.id = Some(volume.name.clone());
        model.name = volume.name;
        model.driver = Some(volume.driver);
        model.mountpoint = Some(volume.mountpoint);
        if let Some(labels) = from_hash_map(Some(volume.labels)) {
            model.labels = Some(labels);
        }
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        _data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        // 更新できるのは削除時の force だけ
        let mut model: VolumeModel = decode(plan, diags)?;
        let prior: VolumeModel = decode(prior, diags)?;
        model.id = prior.id;
        model.mountpoint = prior.mountpoint;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<VolumeModel>(state, diags) else {
            return;
        };
        tracing::debug!("Deleting Docker volume {}", model.name);

        let result = data
            .docker
            .remove_volume(
                &model.name,
                Some(bollard::query_parameters::RemoveVolumeOptions { force: model.force }),
            )
            .await
            .map_err(EngineError::from);

        match result {
            Ok(()) => tracing::debug!("Deleted Docker volume {}", model.name),
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Volume Delete Error",
                format!("Unable to delete volume {}: {}", model.name, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = VolumeModel {
            name: id.to_string(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_is_the_only_in_place_change() {
        let schema = schema();
        for attr in &schema.block.attributes {
            if attr.optional || attr.required {
                assert_eq!(
                    attr.requires_replace,
                    attr.name != "force",
                    "unexpected replace flag on {}",
                    attr.name
                );
            }
        }
    }
}
