//! docker_org_team: 組織のチーム

use crate::ProviderData;
use crate::common::split_import_id;
use serde::{Deserialize, Serialize};
use tfdocker_hub::Team;
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, Resource, Schema, Value, async_trait, decode, encode,
};

pub struct OrgTeamResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OrgTeamModel {
    id: Option<String>,
    org_name: String,
    team_name: String,
    team_description: Option<String>,
    member_count: Option<i64>,
}

impl OrgTeamModel {
    fn apply(&mut self, team: Team) {
        self.id = Some(format!("{}/{}", self.org_name, team.name));
        self.team_name = team.name;
        self.team_description = team.description.filter(|d| !d.is_empty());
        self.member_count = Some(team.member_count);
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a team of a Docker Hub organization.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The ID in the form org_name/team_name.")
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
                Attribute::optional_string("team_description")
                    .description("The team description."),
            )
            .attribute(
                Attribute::computed_number("member_count")
                    .description("Number of members in the team."),
            ),
    )
}

#[async_trait]
impl Resource<ProviderData> for OrgTeamResource {
    fn type_name(&self) -> &'static str {
        "docker_org_team"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgTeamModel = decode(plan, diags)?;
        let description = model.team_description.clone().unwrap_or_default();

        match hub
            .create_team(&model.org_name, &model.team_name, &description)
            .await
        {
            Ok(team) => model.apply(team),
            Err(e) => {
                diags.error(
                    "Docker Hub Team Create Failed",
                    format!(
                        "Unable to create team {} in {}: {}",
                        model.team_name, model.org_name, e
                    ),
                );
                return None;
            }
        }
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgTeamModel = decode(state, diags)?;

        match hub.get_team(&model.org_name, &model.team_name).await {
            Ok(team) => model.apply(team),
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "Team {}/{} not found, removing from state",
                    model.org_name,
                    model.team_name
                );
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Team Read Failed",
                    format!(
                        "Unable to read team {}/{}: {}",
                        model.org_name, model.team_name, e
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
        let mut model: OrgTeamModel = decode(plan, diags)?;
        let description = model.team_description.clone().unwrap_or_default();

        match hub
            .update_team(&model.org_name, &model.team_name, &description)
            .await
        {
            Ok(team) => model.apply(team),
            Err(e) => {
                diags.error(
                    "Docker Hub Team Update Failed",
                    format!(
                        "Unable to update team {}/{}: {}",
                        model.org_name, model.team_name, e
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
        let Some(model) = decode::<OrgTeamModel>(state, diags) else {
            return;
        };

        match hub.delete_team(&model.org_name, &model.team_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diags.error(
                "Docker Hub Team Delete Failed",
                format!(
                    "Unable to delete team {}/{}: {}",
                    model.org_name, model.team_name, e
                ),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parts = split_import_id(id, 2, "org_name/team_name", diags)?;
        let model = OrgTeamModel {
            id: Some(id.to_string()),
            org_name: parts[0].clone(),
            team_name: parts[1].clone(),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
