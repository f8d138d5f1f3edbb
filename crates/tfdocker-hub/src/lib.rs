//! terraform-provider-docker の Docker Hub API クライアント
//!
//! リポジトリ、タグ、組織、チーム、メンバー、リポジトリのチーム権限、
//! パーソナルアクセストークンを扱う。

pub mod access_tokens;
pub mod client;
pub mod error;
pub mod models;
pub mod orgs;
pub mod repositories;

pub use client::{DEFAULT_BASE_URL, HubClient, PAGE_SIZE, Page};
pub use error::{HubError, Result};
pub use models::*;
