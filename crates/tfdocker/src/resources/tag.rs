//! docker_tag: 既存イメージへのタグ付け

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_engine::ImageManager;
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

pub struct TagResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TagModel {
    id: Option<String>,
    source_image: String,
    target_image: String,
    source_image_id: Option<String>,
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Creates a tag that refers to a source image.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The target image reference.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("source_image")
                    .description("Name or ID of the image to tag.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("target_image")
                    .description("The new image reference, including the tag.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::computed_string("source_image_id")
                    .description("ID of the source image."),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for TagResource {
    fn type_name(&self) -> &'static str {
        "docker_tag"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: TagModel = decode(plan, diags)?;
        let images = ImageManager::new(&data.docker);

        let source = match images.inspect(&model.source_image).await {
            Ok(source) => source,
            Err(e) => {
                diags.error(
                    "Source Image Not Found",
                    format!("Unable to inspect source image {}: {}", model.source_image, e),
                );
                return None;
            }
        };

        tracing::debug!("Tagging {} as {}", model.source_image, model.target_image);
        if let Err(e) = images.tag(&model.source_image, &model.target_image).await {
            diags.error(
                "Image Tag Error",
                format!(
                    "Unable to tag {} as {}: {}",
                    model.source_image, model.target_image, e
                ),
            );
            return None;
        }

        model.id = Some(model.target_image.clone());
        model.source_image_id = source.id;
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: TagModel = decode(state, diags)?;

        match ImageManager::new(&data.docker).inspect(&model.target_image).await {
            Ok(target) => {
                if model.source_image_id.is_none() {
                    model.source_image_id = target.id;
                }
                model.id = Some(model.target_image.clone());
                encode(&model, &schema(), diags)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Tag {} is gone, removing from state", model.target_image);
                None
            }
            Err(e) => {
                diags.error(
                    "Image Tag Read Error",
                    format!("Unable to read tag {}: {}", model.target_image, e),
                );
                None
            }
        }
    }

    // 属性はすべて置き換えなので計画値をそのまま返す
    async fn update(
        &self,
        _data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: TagModel = decode(plan, diags)?;
        let prior: TagModel = decode(prior, diags)?;
        model.id = prior.id;
        model.source_image_id = prior.source_image_id;
        encode(&model, &schema(), diags)
    }

    /// タグだけを外す。イメージ本体は他の参照が残る限り消えない
    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<TagModel>(state, diags) else {
            return;
        };

        match ImageManager::new(&data.docker)
            .remove(&model.target_image, false)
            .await
        {
            Ok(()) => tracing::debug!("Removed tag {}", model.target_image),
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Image Tag Delete Error",
                format!("Unable to remove tag {}: {}", model.target_image, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = TagModel {
            id: Some(id.to_string()),
            target_image: id.to_string(),
            ..Default::default()
        };
        diags.warning(
            "Source Image Required",
            "The source_image must be set in the Terraform configuration; it cannot be derived from the tag.",
        );
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::offline_data;

    #[test]
    fn test_schema_replaces() {
        let schema = schema();
        assert!(schema.block.find_attribute("source_image").unwrap().requires_replace);
        assert!(schema.block.find_attribute("target_image").unwrap().requires_replace);
        assert!(schema.block.find_attribute("source_image_id").unwrap().computed);
    }

    #[tokio::test]
    async fn test_import_warns() {
        let data = offline_data();
        let mut diags = Diagnostics::new();
        let value = TagResource
            .import(&data, "registry.local/app:v2", &mut diags)
            .await
            .unwrap();

        assert_eq!(value.get("target_image"), &Value::string("registry.local/app:v2"));
        assert_eq!(value.get("id"), &Value::string("registry.local/app:v2"));
        assert!(!diags.has_error());
        assert_eq!(diags.iter().next().unwrap().summary, "Source Image Required");
    }
}
