//! 組織、メンバー、チームのエンドポイント

use crate::client::HubClient;
use crate::error::Result;
use crate::models::{Member, Organization, Team};
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
struct TeamRequest<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct TeamUpdate<'a> {
    description: &'a str,
}

#[derive(Serialize)]
struct MemberRequest<'a> {
    member: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Serialize)]
struct RoleUpdate<'a> {
    role: &'a str,
}

impl HubClient {
    pub async fn get_organization(&self, org: &str) -> Result<Organization> {
        self.get(&["orgs", org]).await
    }

    // メンバー

    /// ロールを指定してユーザーを組織に招待する
    pub async fn add_org_member(&self, org: &str, username: &str, role: &str) -> Result<()> {
        tracing::debug!("Adding {} to organization {} as {}", username, org, role);
        let body = MemberRequest {
            member: username,
            role: Some(role),
        };
        self.send_empty(Method::POST, &["orgs", org, "members"], Some(&body))
            .await
    }

    pub async fn get_org_member(&self, org: &str, username: &str) -> Result<Member> {
        self.get(&["orgs", org, "members", username]).await
    }

    pub async fn update_org_member(&self, org: &str, username: &str, role: &str) -> Result<()> {
        tracing::debug!("Changing role of {} in {} to {}", username, org, role);
        self.send_empty(
            Method::PATCH,
            &["orgs", org, "members", username],
            Some(&RoleUpdate { role }),
        )
        .await
    }

    pub async fn remove_org_member(&self, org: &str, username: &str) -> Result<()> {
        tracing::debug!("Removing {} from organization {}", username, org);
        self.delete(&["orgs", org, "members", username]).await
    }

    pub async fn list_org_members(&self, org: &str) -> Result<Vec<Member>> {
        self.list_all(&["orgs", org, "members"]).await
    }

    // チーム

    pub async fn create_team(&self, org: &str, name: &str, description: &str) -> Result<Team> {
        tracing::debug!("Creating team {} in {}", name, org);
        self.send(
            Method::POST,
            &["orgs", org, "groups"],
            &TeamRequest { name, description },
        )
        .await
    }

    pub async fn get_team(&self, org: &str, team: &str) -> Result<Team> {
        self.get(&["orgs", org, "groups", team]).await
    }

    pub async fn update_team(&self, org: &str, team: &str, description: &str) -> Result<Team> {
        tracing::debug!("Updating team {} in {}", team, org);
        self.send(
            Method::PATCH,
            &["orgs", org, "groups", team],
            &TeamUpdate { description },
        )
        .await
    }

    pub async fn delete_team(&self, org: &str, team: &str) -> Result<()> {
        tracing::debug!("Deleting team {} in {}", team, org);
        self.delete(&["orgs", org, "groups", team]).await
    }

    pub async fn add_team_member(&self, org: &str, team: &str, username: &str) -> Result<()> {
        tracing::debug!("Adding {} to team {}/{}", username, org, team);
        let body = MemberRequest {
            member: username,
            role: None,
        };
        self.send_empty(
            Method::POST,
            &["orgs", org, "groups", team, "members"],
            Some(&body),
        )
        .await
    }

    pub async fn remove_team_member(&self, org: &str, team: &str, username: &str) -> Result<()> {
        tracing::debug!("Removing {} from team {}/{}", username, org, team);
        self.delete(&["orgs", org, "groups", team, "members", username])
            .await
    }

    pub async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<Member>> {
        self.list_all(&["orgs", org, "groups", team, "members"])
            .await
    }

    /// ユーザーがチームに属しているか
    pub async fn is_team_member(&self, org: &str, team: &str, username: &str) -> Result<bool> {
        let members = self.list_team_members(org, team).await?;
        Ok(members.iter().any(|m| m.username == username))
    }
}
