//! docker_hub_repository_team_permission: チームのリポジトリ権限

use crate::ProviderData;
use crate::common::split_import_id;
use serde::{Deserialize, Serialize};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

const PERMISSIONS: [&str; 3] = ["read", "write", "admin"];

pub struct HubRepositoryTeamPermissionResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PermissionModel {
    id: Option<String>,
    namespace: String,
    repository: String,
    team_name: String,
    permission: String,
}

impl PermissionModel {
    fn import_id(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.repository, self.team_name)
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Grants an organization team a permission on a Docker Hub repository.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The ID in the form namespace/repository/team_name.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("namespace")
                    .description("The organization owning the repository.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("repository")
                    .description("The repository name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("team_name")
                    .description("The team name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("permission")
                    .description("The permission: read, write or admin."),
            ),
    )
}

/// 権限を設定（POST は既存の権限を置き換える）
async fn apply(data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
    let hub = data.hub(diags)?;
    let mut model: PermissionModel = decode(plan, diags)?;

    if let Err(e) = hub
        .set_repository_team_permission(
            &model.namespace,
            &model.repository,
            &model.team_name,
            &model.permission,
        )
        .await
    {
        diags.error(
            "Docker Hub Permission Update Failed",
            format!(
                "Unable to grant {} on {}/{} to team {}: {}",
                model.permission, model.namespace, model.repository, model.team_name, e
            ),
        );
        return None;
    }

    model.id = Some(model.import_id());
    encode(&model, &schema(), diags)
}

#[async_trait]
impl Resource<ProviderData> for HubRepositoryTeamPermissionResource {
    fn type_name(&self) -> &'static str {
        "docker_hub_repository_team_permission"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        if let Some(permission) = config.get("permission").as_str() {
            if !PERMISSIONS.contains(&permission) {
                diags.attribute_error(
                    "permission",
                    "Invalid Permission",
                    format!(
                        "permission must be one of {}, got: {}",
                        PERMISSIONS.join(", "),
                        permission
                    ),
                );
            }
        }
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        apply(data, plan, diags).await
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: PermissionModel = decode(state, diags)?;

        match hub
            .get_repository_team_permission(&model.namespace, &model.repository, &model.team_name)
            .await
        {
            Ok(permission) => model.permission = permission.permission,
            Err(e) if e.is_not_found() => {
                tracing::debug!("Permission {} not found, removing from state", model.import_id());
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Permission Read Failed",
                    format!("Unable to read permission {}: {}", model.import_id(), e),
                );
                return None;
            }
        }

        model.id = Some(model.import_id());
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        _prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        apply(data, plan, diags).await
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(hub) = data.hub(diags) else {
            return;
        };
        let Some(model) = decode::<PermissionModel>(state, diags) else {
            return;
        };

        match hub
            .remove_repository_team_permission(&model.namespace, &model.repository, &model.team_name)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Permission Delete Failed",
                format!("Unable to remove permission {}: {}", model.import_id(), e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parts = split_import_id(id, 3, "namespace/repository/team_name", diags)?;
        let model = PermissionModel {
            id: Some(id.to_string()),
            namespace: parts[0].clone(),
            repository: parts[1].clone(),
            team_name: parts[2].clone(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
