//! パーソナルアクセストークンのエンドポイント

use crate::client::HubClient;
use crate::error::Result;
use crate::models::AccessToken;
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
struct CreateTokenRequest<'a> {
    token_label: &'a str,
    scopes: &'a [String],
}

#[derive(Serialize)]
struct UpdateTokenRequest {
    is_active: bool,
}

impl HubClient {
    /// トークンを作成する。秘密の値はこのレスポンスにしか含まれない
    pub async fn create_access_token(&self, label: &str, scopes: &[String]) -> Result<AccessToken> {
        tracing::debug!("Creating access token {}", label);
        self.send(
            Method::POST,
            &["access-tokens"],
            &CreateTokenRequest {
                token_label: label,
                scopes,
            },
        )
        .await
    }

    pub async fn get_access_token(&self, uuid: &str) -> Result<AccessToken> {
        self.get(&["access-tokens", uuid]).await
    }

    /// トークンを有効化・無効化する
    pub async fn update_access_token(&self, uuid: &str, is_active: bool) -> Result<AccessToken> {
        tracing::debug!("Setting access token {} active={}", uuid, is_active);
        self.send(
            Method::PATCH,
            &["access-tokens", uuid],
            &UpdateTokenRequest { is_active },
        )
        .await
    }

    pub async fn delete_access_token(&self, uuid: &str) -> Result<()> {
        tracing::debug!("Deleting access token {}", uuid);
        self.delete(&["access-tokens", uuid]).await
    }

    pub async fn list_access_tokens(&self) -> Result<Vec<AccessToken>> {
        self.list_all(&["access-tokens"]).await
    }
}
