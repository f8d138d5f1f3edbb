//! docker_org_team_member: チームメンバー

use crate::ProviderData;
use crate::common::split_import_id;
use serde::{Deserialize, Serialize};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

pub struct OrgTeamMemberResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TeamMemberModel {
    id: Option<String>,
    org_name: String,
    team_name: String,
    username: String,
}

impl TeamMemberModel {
    fn import_id(&self) -> String {
        format!("{}/{}/{}", self.org_name, self.team_name, self.username)
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages membership of a user in an organization team.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The ID in the form org_name/team_name/username.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("org_name")
                    .description("The organization name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("team_name")
                    .description("The team name.")
                    .requires_replace(),
            )
            .attribute(
                Attribute::required_string("username")
                    .description("The Docker ID of the user.")
                    .requires_replace(),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for OrgTeamMemberResource {
    fn type_name(&self) -> &'static str {
        "docker_org_team_member"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: TeamMemberModel = decode(plan, diags)?;

        if let Err(e) = hub
            .add_team_member(&model.org_name, &model.team_name, &model.username)
            .await
        {
            diags.error(
                "Docker Hub Team Member Create Failed",
                format!("Unable to add team member {}: {}", model.import_id(), e),
            );
            return None;
        }

        model.id = Some(model.import_id());
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: TeamMemberModel = decode(state, diags)?;

        match hub
            .is_team_member(&model.org_name, &model.team_name, &model.username)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("{} is no longer a team member, removing from state", model.import_id());
                return None;
            }
            // チーム自体がなければメンバーシップもない
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                diags.error(
                    "Docker Hub Team Member Read Failed",
                    format!("Unable to read team member {}: {}", model.import_id(), e),
                );
                return None;
            }
        }

        model.id = Some(model.import_id());
        encode(&model, &schema(), diags)
    }

    async fn update(
        &self,
        _data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: TeamMemberModel = decode(plan, diags)?;
        let prior: TeamMemberModel = decode(prior, diags)?;
        model.id = prior.id;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(hub) = data.hub(diags) else {
            return;
        };
        let Some(model) = decode::<TeamMemberModel>(state, diags) else {
            return;
        };

        match hub
            .remove_team_member(&model.org_name, &model.team_name, &model.username)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Team Member Delete Failed",
                format!("Unable to remove team member {}: {}", model.import_id(), e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parts = split_import_id(id, 3, "org_name/team_name/username", diags)?;
        let model = TeamMemberModel {
            id: Some(id.to_string()),
            org_name: parts[0].clone(),
            team_name: parts[1].clone(),
            username: parts[2].clone(),
        };
        encode(&model, &schema(), diags)
    }
}
