//! docker_org / docker_org_members / docker_org_team

use crate::ProviderData;
use crate::data_sources::object_type;
use serde::{Deserialize, Serialize};
use tfdocker_hub::Member;
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Type, Value, async_trait, decode, encode,
};

pub struct OrgDataSource;

pub struct OrgMembersDataSource;

pub struct OrgTeamDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OrgDataModel {
    id: Option<String>,
    org_name: String,
    full_name: Option<String>,
    location: Option<String>,
    company: Option<String>,
    date_joined: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MemberDataModel {
    id: Option<String>,
    username: String,
    full_name: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

impl From<Member> for MemberDataModel {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            username: member.username,
            full_name: member.full_name,
            email: member.email,
            role: member.role,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OrgMembersDataModel {
    id: Option<String>,
    org_name: String,
    members: Vec<MemberDataModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OrgTeamDataModel {
    id: Option<String>,
    org_name: String,
    team_name: String,
    team_description: Option<String>,
    member_count: Option<i64>,
}

fn org_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a Docker Hub organization.")
            .attribute(Attribute::computed_string("id").description("The organization ID."))
            .attribute(Attribute::required_string("org_name").description("The organization name."))
            .attribute(Attribute::computed_string("full_name").description("Display name."))
            .attribute(Attribute::computed_string("location").description("Location."))
            .attribute(Attribute::computed_string("company").description("Company."))
            .attribute(Attribute::computed_string("date_joined").description("Creation date.")),
    )
}

fn members_schema() -> Schema {
    let member = object_type(vec![
        ("id", Type::String),
        ("username", Type::String),
        ("full_name", Type::String),
        ("email", Type::String),
        ("role", Type::String),
    ]);
    Schema::new(
        Block::new()
            .description("Lists the members of a Docker Hub organization.")
            .attribute(Attribute::computed_string("id").description("The organization name."))
            .attribute(Attribute::required_string("org_name").description("The organization name."))
            .attribute(Attribute::computed("members", Type::list(member)).description("Organization members.")),
    )
}

fn team_schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads a team of a Docker Hub organization.")
            .attribute(Attribute::computed_string("id").description("The ID in the form org_name/team_name."))
            .attribute(Attribute::required_string("org_name").description("The organization name."))
            .attribute(Attribute::required_string("team_name").description("The team name."))
            .attribute(Attribute::computed_string("team_description").description("The team description."))
            .attribute(Attribute::computed_number("member_count").description("Number of members.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for OrgDataSource {
    fn type_name(&self) -> &'static str {
        "docker_org"
    }

    fn schema(&self) -> Schema {
        org_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgDataModel = decode(config, diags)?;

        let org = match hub.get_organization(&model.org_name).await {
            Ok(org) => org,
            Err(e) => {
                diags.error(
                    "Docker Hub Organization Read Failed",
                    format!("Unable to read organization {}: {}", model.org_name, e),
                );
                return None;
            }
        };

        model.id = org.id.or_else(|| Some(model.org_name.clone()));
        model.full_name = org.full_name;
        model.location = org.location;
        model.company = org.company;
        model.date_joined = org.date_joined;
        encode(&model, &org_schema(), diags)
    }
}

#[async_trait]
impl DataSource<ProviderData> for OrgMembersDataSource {
    fn type_name(&self) -> &'static str {
        "docker_org_members"
    }

    fn schema(&self) -> Schema {
        members_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgMembersDataModel = decode(config, diags)?;

        match hub.list_org_members(&model.org_name).await {
            Ok(members) => {
                model.id = Some(model.org_name.clone());
                model.members = members.into_iter().map(MemberDataModel::from).collect();
                encode(&model, &members_schema(), diags)
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Members Read Failed",
                    format!("Unable to list members of {}: {}", model.org_name, e),
                );
                None
            }
        }
    }
}

#[async_trait]
impl DataSource<ProviderData> for OrgTeamDataSource {
    fn type_name(&self) -> &'static str {
        "docker_org_team"
    }

    fn schema(&self) -> Schema {
        team_schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let hub = data.hub(diags)?;
        let mut model: OrgTeamDataModel = decode(config, diags)?;

        match hub.get_team(&model.org_name, &model.team_name).await {
            Ok(team) => {
                model.id = Some(format!("{}/{}", model.org_name, team.name));
                model.team_description = team.description;
                model.member_count = Some(team.member_count);
                encode(&model, &team_schema(), diags)
            }
            Err(e) => {
                diags.error(
                    "Docker Hub Team Read Failed",
                    format!(
                        "Unable to read team {}/{}: {}",
                        model.org_name, model.team_name, e
                    ),
                );
                None
            }
        }
    }
}
