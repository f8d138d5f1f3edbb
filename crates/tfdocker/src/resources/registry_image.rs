//! docker_registry_image: レジストリ上のイメージ
//!
//! `build` があればコンテキストからビルドしてからプッシュする。
//! レジストリからの削除は行わない。

use crate::ProviderData;
use crate::common::{
    RegistryAuthModel, registry_auth_block, resolve_registry_credentials, to_hash_map,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tfdocker_engine::image::first_repo_digest;
use tfdocker_engine::{BuildSpec, ImageBuilder, ImageManager};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, NestedBlock, Resource, Schema, Type, Value, async_trait, decode,
    encode,
};

pub struct RegistryImageResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RegistryImageModel {
    id: Option<String>,
    name: String,
    keep_remotely: Option<bool>,
    insecure_skip_verify: Option<bool>,
    triggers: Option<BTreeMap<String, String>>,
    sha256_digest: Option<String>,
    auth_config: Option<RegistryAuthModel>,
    build: Option<BuildModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct BuildModel {
    context: String,
    dockerfile: Option<String>,
    target: Option<String>,
    build_args: Option<BTreeMap<String, String>>,
    labels: Option<BTreeMap<String, String>>,
    cache_from: Option<Vec<String>>,
    no_cache: Option<bool>,
    force_remove: Option<bool>,
    platform: Option<String>,
}

impl BuildModel {
    fn to_spec(&self, tag: &str) -> BuildSpec {
        BuildSpec {
            context: PathBuf::from(&self.context),
            dockerfile: self
                .dockerfile
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Dockerfile".to_string()),
            tag: tag.to_string(),
            target: self.target.clone().filter(|t| !t.is_empty()),
            build_args: to_hash_map(&self.build_args).unwrap_or_default(),
            labels: to_hash_map(&self.labels).unwrap_or_default(),
            cache_from: self.cache_from.clone().unwrap_or_default(),
            no_cache: self.no_cache.unwrap_or(false),
            force_remove: self.force_remove.unwrap_or(false),
            platform: self.platform.clone().filter(|p| !p.is_empty()),
        }
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Builds and pushes an image to a registry.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The image name.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The full image name including registry and tag.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_bool("keep_remotely")
                    .description("Keep the image in the registry on destroy. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::optional_bool("insecure_skip_verify")
                    .description("Skip TLS verification of the registry. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::optional("triggers", Type::map(Type::String))
                    .description("Values whose change triggers a new push."),
            )
            .attribute(
                Attribute::computed_string("sha256_digest")
                    .description("The digest of the pushed image."),
            )
            .block(registry_auth_block(
                "auth_config",
                "Authentication for the target registry.",
            ))
            .block(NestedBlock::single(
                "build",
                Block::new()
                    .description("Build the image before pushing.")
                    .attribute(
                        Attribute::required_string("context")
                            .description("Path to the build context."),
                    )
                    .attribute(
                        Attribute::optional_string("dockerfile")
                            .description("Dockerfile path relative to the context. Default is Dockerfile.")
                            .with_default("Dockerfile"),
                    )
                    .attribute(Attribute::optional_string("target").description("Build stage to target."))
                    .attribute(
                        Attribute::optional("build_args", Type::map(Type::String))
                            .description("Build-time variables."),
                    )
                    .attribute(
                        Attribute::optional("labels", Type::map(Type::String))
                            .description("Labels applied to the image."),
                    )
                    .attribute(
                        Attribute::optional("cache_from", Type::list(Type::String))
                            .description("Images used as cache sources."),
                    )
                    .attribute(
                        Attribute::optional_bool("no_cache")
                            .description("Do not use the build cache. Default is false.")
                            .with_default(false),
                    )
                    .attribute(
                        Attribute::optional_bool("force_remove")
                            .description("Always remove intermediate containers. Default is false.")
                            .with_default(false),
                    )
                    .attribute(Attribute::optional_string("platform").description("Target platform, e.g. linux/amd64.")),
            )),
    )
}

/// ビルド（指定時）とプッシュを行い、ダイジェストを記録する
async fn build_and_push(
    data: &ProviderData,
    model: &mut RegistryImageModel,
    diags: &mut Diagnostics,
) -> Option<()> {
    if let Some(build) = &model.build {
        tracing::debug!("Building image {} from {}", model.name, build.context);
        if let Err(e) = ImageBuilder::new(&data.docker)
            .build(&build.to_spec(&model.name))
            .await
        {
            diags.error(
                "Image Build Error",
                format!("Unable to build image {}: {}", model.name, e),
            );
            return None;
        }
    }

    let credentials =
        resolve_registry_credentials(&model.name, model.auth_config.as_ref(), diags)?;
    match ImageManager::new(&data.docker)
        .push(&model.name, credentials)
        .await
    {
        Ok(digest) => {
            model.id = Some(model.name.clone());
            model.sha256_digest = digest;
            Some(())
        }
        Err(e) => {
            diags.error(
                "Image Push Error",
                format!("Unable to push image {}: {}", model.name, e),
            );
            None
        }
    }
}

#[async_trait]
impl Resource<ProviderData> for RegistryImageResource {
    fn type_name(&self) -> &'static str {
        "docker_registry_image"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: RegistryImageModel = decode(plan, diags)?;
        build_and_push(data, &mut model, diags).await?;
        encode(&model, &schema(), diags)
    }

    // ローカルイメージが消えてもレジストリ側は残るので state から外さない
    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: RegistryImageModel = decode(state, diags)?;

        match ImageManager::new(&data.docker).inspect(&model.name).await {
            Ok(inspect) => {
                if let Some(digest) = first_repo_digest(&inspect) {
                    model.sha256_digest = Some(digest);
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Local image {} not found, keeping registry state", model.name);
            }
            Err(e) => tracing::warn!("Unable to inspect local image {}: {}", model.name, e),
        }

        model.id = Some(model.name.clone());
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: RegistryImageModel = decode(plan, diags)?;
        let prior: RegistryImageModel = decode(prior, diags)?;

        if model.triggers != prior.triggers || model.build.is_some() != prior.build.is_some() {
            build_and_push(data, &mut model, diags).await?;
        } else {
            model.id = prior.id;
            model.sha256_digest = prior.sha256_digest;
        }
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, _data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<RegistryImageModel>(state, diags) else {
            return;
        };

        if model.keep_remotely.unwrap_or(false) {
            tracing::debug!("Keeping {} in the registry as configured", model.name);
            return;
        }
        diags.warning(
            "Registry Deletion Not Supported",
            format!(
                "The image {} was removed from state but still exists in the registry. Delete it with the registry's own tooling.",
                model.name
            ),
        );
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = RegistryImageModel {
            id: Some(id.to_string()),
            name: id.to_string(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
