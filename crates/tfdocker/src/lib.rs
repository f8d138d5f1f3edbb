//! Docker Engine・Docker Swarm・Docker Hub 用 Terraform プロバイダー
//!
//! - [`provider`]: provider ブロックとクライアントの構築
//! - [`resources`]: `docker_*` リソース
//! - [`data_sources`]: `docker_*` データソース

pub mod common;
pub mod data_sources;
pub mod logging;
pub mod provider;
pub mod resources;

pub use provider::{DockerProvider, PROVIDER_ADDRESS, ProviderData};
