//! docker_registry_image データソース

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_engine::ImageManager;
use tfdocker_engine::image::first_repo_digest;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Value, async_trait, decode, encode,
};

pub struct RegistryImageDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RegistryImageDataModel {
    id: Option<String>,
    name: String,
    sha256_digest: Option<String>,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads the digest of an image known to the local daemon.")
            .attribute(Attribute::computed_string("id").description("The image ID."))
            .attribute(Attribute::required_string("name").description("The image name."))
            .attribute(
                Attribute::computed_string("sha256_digest")
                    .description("The repository digest, or the image ID when the image was never pushed or pulled."),
            ),
    )
}

#[async_trait]
impl DataSource<ProviderData> for RegistryImageDataSource {
    fn type_name(&self) -> &'static str {
        "docker_registry_image"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: RegistryImageDataModel = decode(config, diags)?;

        let inspect = match ImageManager::new(&data.docker).inspect(&model.name).await {
            Ok(inspect) => inspect,
            Err(e) => {
                diags.error(
                    "Failed to Inspect Image",
                    format!("Unable to inspect image {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.sha256_digest = first_repo_digest(&inspect).or_else(|| inspect.id.clone());
        model.id = inspect.id;
        encode(&model, &schema(), diags)
    }
}
