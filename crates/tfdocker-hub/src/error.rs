//! Docker Hub クライアントのエラー型

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    /// Hub が対象オブジェクトに 404 を返したか
    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
