//! docker_image データソース

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_engine::ImageManager;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ImageDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ImageDataModel {
    id: Option<String>,
    name: String,
    image_id: Option<String>,
    repo_digests: Option<Vec<String>>,
    repo_tags: Option<Vec<String>>,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a local Docker image.")
            .attribute(Attribute::computed_string("id").description("The image ID."))
            .attribute(Attribute::required_string("name").description("Name or ID of the image."))
            .attribute(Attribute::computed_string("image_id").description("The image ID."))
            .attribute(
                Attribute::computed("repo_digests", Type::list(Type::String))
                    .description("Repository digests of the image."),
            )
            .attribute(
                Attribute::computed("repo_tags", Type::list(Type::String))
                    .description("Repository tags of the image."),
            ),
    )
}

#[async_trait]
impl DataSource<ProviderData> for ImageDataSource {
    fn type_name(&self) -> &'static str {
        "docker_image"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ImageDataModel = decode(config, diags)?;

        let inspect = match ImageManager::new(&data.docker).inspect(&model.name).await {
            Ok(inspect) => inspect,
            Err(e) => {
                diags.error(
                    "Image Not Found",
                    format!("Unable to read image {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.id = inspect.id.clone();
        model.image_id = inspect.id;
        model.repo_digests = Some(inspect.repo_digests.unwrap_or_default());
        model.repo_tags = Some(inspect.repo_tags.unwrap_or_default());
        encode(&model, &schema(), diags)
    }
}
