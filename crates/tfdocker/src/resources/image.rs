//! docker_image: ローカルに pull したイメージ

use crate::ProviderData;
use crate::common::{RegistryAuthModel, registry_auth_block, resolve_registry_credentials};
use serde::{Deserialize, Serialize};
use tfdocker_engine::ImageManager;
use tfdocker_engine::image::first_repo_digest;
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ImageResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ImageModel {
    id: Option<String>,
    name: String,
    keep_locally: bool,
    force_remove: bool,
    pull_triggers: Option<Vec<String>>,
    image_id: Option<String>,
    repo_digest: Option<String>,
    registry_auth: Option<RegistryAuthModel>,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Pulls a Docker image to the host.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The image ID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the image, including an optional tag or digest.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_bool("keep_locally")
                    .description("Keep the image on destroy. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::optional_bool("force_remove")
                    .description("Force removal of the image on destroy. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::optional("pull_triggers", Type::list(Type::String))
                    .description("Values whose change triggers a new pull.")
                    .requires_replace(),
            )
            .attribute(Attribute::computed_string("image_id").description("The image ID."))
            .attribute(
                Attribute::computed_string("repo_digest")
                    .description("The image digest in the form of repo@sha256:..."),
            )
            .block(registry_auth_block(
                "registry_auth",
                "Registry authentication configuration.",
            )),
    )
}

/// pull して inspect の結果をモデルに反映
async fn pull(data: &ProviderData, model: &mut ImageModel, diags: &mut Diagnostics) -> Option<()> {
    let credentials =
        resolve_registry_credentials(&model.name, model.registry_auth.as_ref(), diags)?;
    let images = ImageManager::new(&data.docker);

    tracing::debug!("Pulling Docker image {}", model.name);
    if let Err(e) = images.pull(&model.name, credentials).await {
        diags.error(
            "Image Pull Error",
            format!("Unable to pull image {}: {}", model.name, e),
        );
        return None;
    }

    let inspect = match images.inspect(&model.name).await {
        Ok(inspect) => inspect,
        Err(e) => {
            diags.error(
                "Image Inspect Error",
                format!("Unable to inspect pulled image {}: {}", model.name, e),
            );
            return None;
        }
    };

    model.id = inspect.id.clone();
    model.image_id = inspect.id.clone();
    model.repo_digest = first_repo_digest(&inspect);
    Some(())
}

#[async_trait]
impl Resource<ProviderData> for ImageResource {
    fn type_name(&self) -> &'static str {
        "docker_image"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ImageModel = decode(plan, diags)?;
        pull(data, &mut model, diags).await?;
        tracing::debug!("Created Docker image {} ({:?})", model.name, model.image_id);
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ImageModel = decode(state, diags)?;

        match ImageManager::new(&data.docker).inspect(&model.name).await {
            Ok(inspect) => {
                model.image_id = inspect.id.clone();
                if model.id.is_none() {
                    model.id = inspect.id.clone();
                }
                model.repo_digest = first_repo_digest(&inspect);
                encode(&model, &schema(), diags)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Image {} is gone, removing from state", model.name);
                None
            }
            Err(e) => {
                diags.error(
                    "Image Read Error",
                    format!("Unable to read image {}: {}", model.name, e),
                );
                None
            }
        }
    }

    async fn update(
        &self,
        data: &ProviderData,
        _prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: ImageModel = decode(plan, diags)?;
        pull(data, &mut model, diags).await?;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<ImageModel>(state, diags) else {
            return;
        };

        if model.keep_locally {
            tracing::debug!("Keeping image {} locally as configured", model.name);
            return;
        }

        match ImageManager::new(&data.docker)
            .remove(&model.name, model.force_remove)
            .await
        {
            Ok(()) => tracing::debug!("Deleted Docker image {}", model.name),
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Image Delete Error",
                format!("Unable to remove image {}: {}", model.name, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = ImageModel {
            name: id.to_string(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::offline_data;

    #[test]
    fn test_schema_defaults() {
        let schema = schema();
        let keep = schema.block.find_attribute("keep_locally").unwrap();
        assert_eq!(keep.default, Some(Value::Bool(false)));
        assert!(schema.block.find_attribute("name").unwrap().requires_replace);
        assert!(
            schema
                .block
                .find_attribute("pull_triggers")
                .unwrap()
                .requires_replace
        );
    }

    #[tokio::test]
    async fn test_import_sets_name() {
        let data = offline_data();
        let mut diags = Diagnostics::new();
        let value = ImageResource
            .import(&data, "nginx:1.27", &mut diags)
            .await
            .unwrap();
        assert_eq!(value.get("name"), &Value::string("nginx:1.27"));
        assert!(value.get("registry_auth").is_null());
    }
}
