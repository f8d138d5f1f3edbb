//! Docker Hub API のオブジェクト

use serde::{Deserialize, Serialize};

/// Hub リポジトリ
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub namespace: String,
    pub name: String,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub is_private: bool,
    pub pull_count: i64,
    pub star_count: i64,
    pub last_updated: Option<String>,
    pub date_registered: Option<String>,
    pub user: Option<String>,
    pub status: Option<i64>,
}

/// リポジトリ作成のペイロード
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewRepository {
    pub namespace: String,
    pub name: String,
    pub description: String,
    pub full_description: String,
    pub is_private: bool,
}

/// リポジトリ更新のペイロード
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepositoryUpdate {
    pub description: String,
    pub full_description: String,
}

/// リポジトリのタグ
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepositoryTag {
    pub name: String,
    pub full_size: i64,
    pub last_updated: Option<String>,
    pub digest: Option<String>,
}

/// 組織のチーム。API 上は "groups" と呼ばれる
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: Option<i64>,
    pub uuid: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub member_count: i64,
}

/// 組織またはチームのメンバー
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Member {
    pub id: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// "member" または "owner"
    pub role: Option<String>,
}

/// リポジトリに対するチームの権限
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepositoryPermission {
    #[serde(rename = "group_name")]
    pub team_name: String,
    /// "read"、"write"、"admin" のいずれか
    pub permission: String,
}

/// パーソナルアクセストークン
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccessToken {
    pub uuid: String,
    /// 作成時だけ返る
    pub token: Option<String>,
    #[serde(rename = "token_label")]
    pub label: String,
    pub scopes: Vec<String>,
    pub is_active: bool,
    pub created_at: Option<String>,
    pub last_used_at: Option<String>,
    pub generated_by: Option<String>,
}

/// Hub の組織
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Organization {
    pub id: Option<String>,
    pub orgname: String,
    pub full_name: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub date_joined: Option<String>,
    pub gravatar_url: Option<String>,
    pub profile_url: Option<String>,
    #[serde(rename = "type")]
    pub org_type: Option<String>,
}
