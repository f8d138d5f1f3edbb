//! docker_compose: Compose プロジェクト
//!
//! Compose CLI は使わず、ファイルを解釈して Engine API で
//! ネットワーク・ボリューム・コンテナを作る。

use crate::ProviderData;
use serde::{Deserialize, Serialize};
use tfdocker_compose::{ComposeError, ComposeFile, ComposeSource, content_hash};
use tfdocker_engine::{ComposeProject, UpOptions};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Type, Value, async_trait, decode, encode,
};

pub struct ComposeResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ComposeModel {
    id: Option<String>,
    project_name: String,
    compose_file: Option<String>,
    compose_content: Option<String>,
    remove_orphans: Option<bool>,
    remove_volumes: Option<bool>,
    force_recreate: Option<bool>,
    content_hash: Option<String>,
    services: Option<Vec<String>>,
    running_services: Option<i64>,
}

impl ComposeModel {
    fn source(&self) -> Result<ComposeSource, ComposeError> {
        ComposeSource::from_attributes(
            self.compose_file.as_deref().filter(|f| !f.is_empty()),
            self.compose_content.as_deref(),
        )
    }

    /// 内容のハッシュ。ファイルが読めない場合は空内容として扱う
    fn hash(&self) -> String {
        let content = self
            .source()
            .and_then(|source| source.read())
            .unwrap_or_default();
        content_hash(&content)
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a Docker Compose project through the Engine API.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The project name.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("project_name")
                    .description("The Compose project name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_string("compose_file")
                    .description("Path to the Compose file."),
            )
            .attribute(
                Attribute::optional_string("compose_content")
                    .description("Inline Compose file content."),
            )
            .attribute(
                Attribute::optional_bool("remove_orphans")
                    .description("Remove containers of services no longer in the file. Default is true.")
                    .with_default(true),
            )
            .attribute(
                Attribute::optional_bool("remove_volumes")
                    .description("Remove project volumes on destroy. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::optional_bool("force_recreate")
                    .description("Recreate all containers on update. Default is false.")
                    .with_default(false),
            )
            .attribute(
                Attribute::computed_string("content_hash")
                    .description("SHA-256 of the Compose content."),
            )
            .attribute(
                Attribute::computed("services", Type::list(Type::String))
                    .description("Service names, sorted."),
            )
            .attribute(
                Attribute::computed_number("running_services")
                    .description("Number of running containers in the project."),
            ),
    )
}

/// Compose ファイルを読み込む。取得元がなければ "Missing Compose Configuration"
fn load(model: &ComposeModel, diags: &mut Diagnostics) -> Option<ComposeFile> {
    let source = match model.source() {
        Ok(source) => source,
        Err(_) => {
            diags.error(
                "Missing Compose Configuration",
                "Either compose_file or compose_content must be specified.",
            );
            return None;
        }
    };

    match source.load() {
        Ok(file) => Some(file),
        Err(e) => {
            diags.error(
                "Compose Parse Error",
                format!("Failed to parse compose file: {}", e),
            );
            None
        }
    }
}

/// 計算値を更新。ファイルがなければサービス一覧は前回のまま
async fn refresh(data: &ProviderData, model: &mut ComposeModel, file: Option<&ComposeFile>) {
    model.content_hash = Some(model.hash());

    let project = ComposeProject::new(&data.docker, &model.project_name);
    match project.running_count().await {
        Ok(count) => model.running_services = Some(count as i64),
        Err(e) => tracing::warn!(
            "Failed to count running containers of {}: {}",
            model.project_name,
            e
        ),
    }

    if let Some(file) = file {
        model.services = Some(file.services.keys().cloned().collect());
    }
}

#[async_trait]
impl Resource<ProviderData> for ComposeResource {
    fn type_name(&self) -> &'static str {
        "docker_compose"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ComposeModel = decode(plan, diags)?;
        let file = load(&model, diags)?;
        tracing::debug!("Creating Docker Compose stack {}", model.project_name);

        let project = ComposeProject::new(&data.docker, &model.project_name);
        if let Err(e) = project.up(&file, UpOptions::default()).await {
            diags.error(
                "Compose Up Error",
                format!("Failed to start compose project {}: {}", model.project_name, e),
            );
            return None;
        }

        model.id = Some(model.project_name.clone());
        refresh(data, &mut model, Some(&file)).await;
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ComposeModel = decode(state, diags)?;

        // ファイルが消えていてもスタックは残っている可能性がある
        let file = match model.source().and_then(|source| source.load()) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Failed to parse compose file: {}", e);
                None
            }
        };

        refresh(data, &mut model, file.as_ref()).await;
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: ComposeModel = decode(plan, diags)?;
        let prior: ComposeModel = decode(prior, diags)?;
        let file = load(&model, diags)?;
        tracing::debug!("Updating Docker Compose stack {}", model.project_name);

        let project = ComposeProject::new(&data.docker, &model.project_name);
        let options = UpOptions {
            force_recreate: model.force_recreate.unwrap_or(false),
            tolerate_resource_errors: true,
        };
        match project.up(&file, options).await {
            Ok(warnings) => {
                for warning in warnings {
                    diags.warning("Compose Resource Warning", warning);
                }
            }
            Err(e) => {
                diags.error(
                    "Compose Up Error",
                    format!("Failed to update compose project {}: {}", model.project_name, e),
                );
                return None;
            }
        }

        if model.remove_orphans.unwrap_or(true) {
            match project.remove_orphans(&file).await {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!("Removed orphan services: {}", removed.join(", "));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to remove orphan containers: {}", e),
            }
        }

        model.id = prior.id.or_else(|| Some(model.project_name.clone()));
        refresh(data, &mut model, Some(&file)).await;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<ComposeModel>(state, diags) else {
            return;
        };
        tracing::debug!("Deleting Docker Compose stack {}", model.project_name);

        let project = ComposeProject::new(&data.docker, &model.project_name);
        if let Err(e) = project.down(model.remove_volumes.unwrap_or(false)).await {
            diags.error(
                "Compose Down Error",
                format!("Failed to remove compose project {}: {}", model.project_name, e),
            );
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = ComposeModel {
            id: Some(id.to_string()),
            project_name: id.to_string(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONTENT: &str = "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n";

    #[test]
    fn test_hash_follows_source() {
        let inline = ComposeModel {
            compose_content: Some(CONTENT.to_string()),
            ..Default::default()
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONTENT.as_bytes()).unwrap();
        let on_disk = ComposeModel {
            compose_file: Some(file.path().display().to_string()),
            ..Default::default()
        };

        assert_eq!(inline.hash(), content_hash(CONTENT));
        assert_eq!(on_disk.hash(), inline.hash());

        let missing = ComposeModel {
            compose_file: Some("/nonexistent/compose.yaml".to_string()),
            ..Default::default()
        };
        assert_eq!(missing.hash(), content_hash(""));
    }

    #[test]
    fn test_missing_configuration() {
        let mut diags = Diagnostics::new();
        assert!(load(&ComposeModel::default(), &mut diags).is_none());
        assert_eq!(
            diags.iter().next().unwrap().summary,
            "Missing Compose Configuration"
        );
    }

    #[test]
    fn test_load_reports_parse_error() {
        let mut diags = Diagnostics::new();
        let model = ComposeModel {
            compose_content: Some("services: [".to_string()),
            ..Default::default()
        };
        assert!(load(&model, &mut diags).is_none());
        assert_eq!(diags.iter().next().unwrap().summary, "Compose Parse Error");
    }

    #[test]
    fn test_services_sorted() {
        let model = ComposeModel {
            compose_content: Some(CONTENT.to_string()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let file = load(&model, &mut diags).unwrap();
        let names: Vec<String> = file.services.keys().cloned().collect();
        assert_eq!(names, vec!["db", "web"]);
    }
}
