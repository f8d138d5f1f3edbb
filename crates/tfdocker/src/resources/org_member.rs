//! docker_org_member: 組織メンバー

use crate::ProviderData;
use crate::common::split_import_id;
use serde::{Deserialize, Serialize};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

pub struct OrgMemberResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OrgMemberModel {
    id: Option<String>,
    org_name: String,
    username: String,
    role: Option<String>,
}

impl OrgMemberModel {
    fn role(&self) -> &str {
        self.role.as_deref().unwrap_or("member")
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages membership of a user in a Docker Hub organization.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The ID in the form org_name/username.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("org_name")
                    .description("The organization name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("username")
                    .description("The Docker ID of the user.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::optional_string("role")
                    .description("The role in the organization: member or owner. Default is member.")
                    .with_default("member"),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for OrgMemberResource {
    fn type_name(&self) -> &'static str {
        "docker_org_member"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgMemberModel = decode(plan, diags)?;

        if let Err(e) = hub
            .add_org_member(&model.org_name, &model.username, model.role())
            .await
        {
            diags.error(
                "Docker Hub Member Create Failed",
                format!(
                    "Unable to add {} to organization {}: {}",
                    model.username, model.org_name, e
                ),
            );
            return None;
        }

        model.id = Some(format!("{}/{}", model.org_name, model.username));
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgMemberModel = decode(state, diags)?;

        match hub.get_org_member(&model.org_name, &model.username).await {
            Ok(member) => {
                if let Some(role) = member.role.filter(|r| !r.is_empty()) {
                    model.role = Some(role);
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "Member {} of {} not found, removing from state",
                    model.username,
                    model.org_name
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Member Read Failed",
                    format!(
                        "Unable to read member {} of {}: {}",
                        model.username, model.org_name, e
                    ),
                );
                return None;
            }
        }

        model.id = Some(format!("{}/{}", model.org_name, model.username));
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgMemberModel = decode(plan, diags)?;
        let prior: OrgMemberModel = decode(prior, diags)?;

        if let Err(e) = hub
            .update_org_member(&model.org_name, &model.username, model.role())
            .await
        {
            diags.error(
                "Docker Hub Member Update Failed",
                format!(
                    "Unable to change role of {} in {}: {}",
                    model.username, model.org_name, e
                ),
            );
            return None;
        }

        model.id = prior.id;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(hub) = data.hub(diags) else {
            return;
        };
        let Some(model) = decode::<OrgMemberModel>(state, diags) else {
            return;
        };

        match hub.remove_org_member(&model.org_name, &model.username).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Member Delete Failed",
                format!(
                    "Unable to remove {} from {}: {}",
                    model.username, model.org_name, e
                ),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parts = split_import_id(id, 2, "org_name/username", diags)?;
        let model = OrgMemberModel {
            id: Some(id.to_string()),
            org_name: parts[0].clone(),
            username: parts[1].clone(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
