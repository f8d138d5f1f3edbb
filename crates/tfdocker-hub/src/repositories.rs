//! リポジトリ、タグ、リポジトリ権限のエンドポイント

use crate::client::HubClient;
use crate::error::Result;
use crate::models::{
    NewRepository, Repository, RepositoryPermission, RepositoryTag, RepositoryUpdate,
};
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
struct PermissionRequest<'a> {
    group_name: &'a str,
    permission: &'a str,
}

impl HubClient {
    /// 名前空間にリポジトリを作成
    pub async fn create_repository(&self, repo: &NewRepository) -> Result<Repository> {
        tracing::debug!("Creating repository {}/{}", repo.namespace, repo.name);
        self.send(Method::POST, &["repositories", repo.namespace.as_str()], repo)
            .await
    }

    pub async fn get_repository(&self, namespace: &str, name: &str) -> Result<Repository> {
        self.get(&["repositories", namespace, name]).await
    }

    /// リポジトリの説明を更新
    pub async fn update_repository(
        &self,
        namespace: &str,
        name: &str,
        update: &RepositoryUpdate,
    ) -> Result<Repository> {
        tracing::debug!("Updating repository {}/{}", namespace, name);
        self.send(Method::PATCH, &["repositories", namespace, name], update)
            .await
    }

    pub async fn delete_repository(&self, namespace: &str, name: &str) -> Result<()> {
        tracing::debug!("Deleting repository {}/{}", namespace, name);
        self.delete(&["repositories", namespace, name]).await
    }

    /// 名前空間の全リポジトリ
    pub async fn list_repositories(&self, namespace: &str) -> Result<Vec<Repository>> {
        self.list_all(&["repositories", namespace]).await
    }

    /// リポジトリの全タグ
    pub async fn list_repository_tags(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<RepositoryTag>> {
        self.list_all(&["repositories", namespace, name, "tags"])
            .await
    }

    /// チームにリポジトリの権限を与える。再送すると置き換わる
    pub async fn set_repository_team_permission(
        &self,
        namespace: &str,
        repository: &str,
        team: &str,
        permission: &str,
    ) -> Result<()> {
        tracing::debug!(
            "Setting {} permission for team {} on {}/{}",
            permission,
            team,
            namespace,
            repository
        );
        let body = PermissionRequest {
            group_name: team,
            permission,
        };
        self.send_empty(
            Method::POST,
            &["repositories", namespace, repository, "groups"],
            Some(&body),
        )
        .await
    }

    pub async fn get_repository_team_permission(
        &self,
        namespace: &str,
        repository: &str,
        team: &str,
    ) -> Result<RepositoryPermission> {
        self.get(&["repositories", namespace, repository, "groups", team])
            .await
    }

    pub async fn remove_repository_team_permission(
        &self,
        namespace: &str,
        repository: &str,
        team: &str,
    ) -> Result<()> {
        self.delete(&["repositories", namespace, repository, "groups", team])
            .await
    }
}
