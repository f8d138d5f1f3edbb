//! docker_hub_repository / docker_hub_repositories / docker_hub_repository_tags

use crate::ProviderData;
use crate::data_sources::object_type;
use serde::{Deserialize, Serialize};
use tfdocker_hub::{Repository, RepositoryTag};
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct HubRepositoryDataSource;

pub struct HubRepositoriesDataSource;

pub struct HubRepositoryTagsDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RepositoryDataModel {
    id: Option<String>,
    namespace: String,
    name: String,
    description: Option<String>,
    full_description: Option<String>,
    private: Option<bool>,
    pull_count: Option<i64>,
    star_count: Option<i64>,
}

impl From<Repository> for RepositoryDataModel {
    fn from(repo: Repository) -> Self {
        Self {
            id: Some(format!("{}/{}", repo.namespace, repo.name)),
            namespace: repo.namespace,
            name: repo.name,
            description: repo.description,
            full_description: repo.full_description,
            private: Some(repo.is_private),
            pull_count: Some(repo.pull_count),
            star_count: Some(repo.star_count),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RepositoriesDataModel {
    id: Option<String>,
    namespace: String,
    repositories: Vec<RepositoryDataModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TagDataModel {
    name: String,
    full_size: i64,
    last_updated: Option<String>,
    digest: Option<String>,
}

impl From<RepositoryTag> for TagDataModel {
    fn from(tag: RepositoryTag) -> Self {
        Self {
            name: tag.name,
            full_size: tag.full_size,
            last_updated: tag.last_updated,
            digest: tag.digest,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TagsDataModel {
    id: Option<String>,
    namespace: String,
    name: String,
    tags: Vec<TagDataModel>,
}

fn repository_fields() -> Vec<(&'static str, Type)> {
    vec![
        ("id", Type::String),
        ("namespace", Type::String),
        ("name", Type::String),
        ("description", Type::String),
        ("full_description", Type::String),
        ("private", Type::Bool),
        ("pull_count", Type::Number),
        ("star_count", Type::Number),
    ]
}

fn repository_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a Docker Hub repository.")
            .attribute(Attribute::computed_string("id").description("The repository ID in the form namespace/name."))
            .attribute(Attribute::required_string("namespace").description("The user or organization."))
            .attribute(Attribute::required_string("name").description("The repository name."))
            .attribute(Attribute::computed_string("description").description("Short description."))
            .attribute(Attribute::computed_string("full_description").description("Full description."))
            .attribute(Attribute::computed_bool("private").description("Whether the repository is private."))
            .attribute(Attribute::computed_number("pull_count").description("Number of pulls."))
            .attribute(Attribute::computed_number("star_count").description("Number of stars.")),
    )
}

fn repositories_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Lists the repositories of a Docker Hub namespace.")
            .attribute(Attribute::computed_string("id").description("The namespace."))
            .attribute(Attribute::required_string("namespace").description("The user or organization."))
            .attribute(
                Attribute::computed("repositories", Type::list(object_type(repository_fields())))
                    .description("All repositories of the namespace."),
            ),
    )
}

fn tags_schema() -> Schema {
    let tag = object_type(vec![
        ("name", Type::String),
        ("full_size", Type::Number),
        ("last_updated", Type::String),
        ("digest", Type::String),
    ]);
    Schema::new(
        Block::new()
            .description("Lists the tags of a Docker Hub repository.")
            .attribute(Attribute::computed_string("id").description("The repository ID in the form namespace/name."))
            .attribute(Attribute::required_string("namespace").description("The user or organization."))
            .attribute(Attribute::required_string("name").description("The repository name."))
            .attribute(Attribute::computed("tags", Type::list(tag)).description("All tags of the repository.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for HubRepositoryDataSource {
    fn type_name(&self) -> &'static str {
        "docker_hub_repository"
    }

    fn schema(&self) -> Schema {
        repository_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let config: RepositoryDataModel = decode(config, diags)?;

        match hub.get_repository(&config.namespace, &config.name).await {
            Ok(repo) => encode(&RepositoryDataModel::from(repo), &repository_schema(), diags),
            Err(e) => {
                diags.error(
                    "Docker Hub Repository Read Failed",
                    format!(
                        "Unable to read repository {}/{}: {}",
                        config.namespace, config.name, e
                    ),
                );
                None
            }
        }
    }
}

#[async_trait]
impl DataSource<ProviderData> for HubRepositoriesDataSource {
    fn type_name(&self) -> &'static str {
        "docker_hub_repositories"
    }

    fn schema(&self) -> Schema {
        repositories_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: RepositoriesDataModel = decode(config, diags)?;

        match hub.list_repositories(&model.namespace).await {
            Ok(repos) => {
                model.id = Some(model.namespace.clone());
                model.repositories = repos.into_iter().map(RepositoryDataModel::from).collect();
                encode(&model, &repositories_schema(), diags)
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Repositories Read Failed",
                    format!("Unable to list repositories of {}: {}", model.namespace, e),
                );
                None
            }
        }
    }
}

#[async_trait]
impl DataSource<ProviderData> for HubRepositoryTagsDataSource {
    fn type_name(&self) -> &'static str {
        "docker_hub_repository_tags"
    }

    fn schema(&self) -> Schema {
        tags_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: TagsDataModel = decode(config, diags)?;

        match hub.list_repository_tags(&model.namespace, &model.name).await {
            Ok(tags) => {
                model.id = Some(format!("{}/{}", model.namespace, model.name));
                model.tags = tags.into_iter().map(TagDataModel::from).collect();
                encode(&model, &tags_schema(), diags)
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Tags Read Failed",
                    format!(
                        "Unable to list tags of {}/{}: {}",
                        model.namespace, model.name, e
                    ),
                );
                None
            }
        }
    }
}
