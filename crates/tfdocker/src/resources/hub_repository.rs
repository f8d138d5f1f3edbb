//! docker_hub_repository: Docker Hub のリポジトリ

use crate::ProviderData;
use crate::common::split_import_id;
use serde::{Deserialize, Serialize};
use tfdocker_hub::{NewRepository, Repository, RepositoryUpdate};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

pub struct HubRepositoryResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct HubRepositoryModel {
    id: Option<String>,
    namespace: String,
    name: String,
    description: Option<String>,
    full_description: Option<String>,
    private: Option<bool>,
    pull_count: Option<i64>,
    star_count: Option<i64>,
}

impl HubRepositoryModel {
    fn apply(&mut self, repo: Repository) {
        self.id = Some(format!("{}/{}", repo.namespace, repo.name));
        self.namespace = repo.namespace;
        self.name = repo.name;
        self.description = repo.description.filter(|d| !d.is_empty());
        self.full_description = repo.full_description.filter(|d| !d.is_empty());
        self.private = Some(repo.is_private);
        self.pull_count = Some(repo.pull_count);
        self.star_count = Some(repo.star_count);
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a Docker Hub repository.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The repository ID in the form namespace/name.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("namespace")
                    .description("The user or organization owning the repository.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The repository name.")
                    .requires_replace(),
            )
            .attribute(Attribute::optional_string("description").description("Short description."))
            .attribute(
                Attribute::optional_string("full_description")
                    .description("Full description in Markdown."),
            )
            .attribute(
                Attribute::optional_bool("private")
                    .description("Whether the repository is private. Default is false.")
                    .with_default(false),
            )
            .attribute(Attribute::computed_number("pull_count").description("Number of pulls."))
            .attribute(Attribute::computed_number("star_count").description("Number of stars.")),
    )
}

#[async_trait]
impl Resource<ProviderData> for HubRepositoryResource {
    fn type_name(&self) -> &'static str {
        "docker_hub_repository"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: HubRepositoryModel = decode(plan, diags)?;

        let request = NewRepository {
            namespace: model.namespace.clone(),
            name: model.name.clone(),
            description: model.description.clone().unwrap_or_default(),
            full_description: model.full_description.clone().unwrap_or_default(),
            is_private: model.private.unwrap_or(false),
        };
        match hub.create_repository(&request).await {
            Ok(repo) => model.apply(repo),
            Err(e) => {
                diags.error(
                    "Docker Hub Repository Create Failed",
                    format!(
                        "Unable to create repository {}/{}: {}",
                        model.namespace, model.name, e
                    ),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: HubRepositoryModel = decode(state, diags)?;

        match hub.get_repository(&model.namespace, &model.name).await {
            Ok(repo) => model.apply(repo),
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "Repository {}/{} not found, removing from state",
                    model.namespace,
                    model.name
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Repository Read Failed",
                    format!(
                        "Unable to read repository {}/{}: {}",
                        model.namespace, model.name, e
                    ),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        _prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: HubRepositoryModel = decode(plan, diags)?;

        let update = RepositoryUpdate {
            description: model.description.clone().unwrap_or_default(),
            full_description: model.full_description.clone().unwrap_or_default(),
        };
        match hub
            .update_repository(&model.namespace, &model.name, &update)
            .await
        {
            Ok(repo) => {
                // PATCH は公開設定を変えないので計画値を残す
                let private = model.private;
                model.apply(repo);
                model.private = private;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Repository Update Failed",
                    format!(
                        "Unable to update repository {}/{}: {}",
                        model.namespace, model.name, e
                    ),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(hub) = data.hub(diags) else {
            return;
        };
        let Some(model) = decode::<HubRepositoryModel>(state, diags) else {
            return;
        };

        match hub.delete_repository(&model.namespace, &model.name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Repository Delete Failed",
                format!(
                    "Unable to delete repository {}/{}: {}",
                    model.namespace, model.name, e
                ),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parts = split_import_id(id, 2, "namespace/name", diags)?;
        let model = HubRepositoryModel {
            id: Some(id.to_string()),
            namespace: parts[0].clone(),
            name: parts[1].clone(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_repository() {
        let mut model = HubRepositoryModel::default();
        model.apply(Repository {
            namespace: "acme".to_string(),
            name: "api".to_string(),
            description: Some(String::new()),
            is_private: true,
            pull_count: 42,
            ..Default::default()
        });

        assert_eq!(model.id.as_deref(), Some("acme/api"));
        assert_eq!(model.description, None);
        assert_eq!(model.private, Some(true));
        assert_eq!(model.pull_count, Some(42));
    }
}
