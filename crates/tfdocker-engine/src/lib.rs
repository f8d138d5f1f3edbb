//! Docker Engine 連携
//!
//! プロバイダのリソースが使う Docker Engine 操作をまとめたクレート。
//!
//! - [`client`]: ホスト指定と TLS 設定からのクライアント構築
//! - [`auth`]: レジストリ認証情報の解決
//! - [`image`] / [`builder`] / [`context`]: イメージの pull・push・ビルド
//! - [`converter`] / [`project`]: Compose プロジェクトの作成と削除
//! - [`waiter`]: Swarm サービスの収束待機
//! - [`engine_api`]: Bollard にない Swarm コンフィグとプラグインの API
//! - [`logs`]: コンテナログの取得

pub mod auth;
pub mod builder;
pub mod client;
pub mod engine_api;
pub mod context;
pub mod converter;
pub mod duration;
pub mod error;
pub mod image;
pub mod logs;
pub mod project;
pub mod waiter;

pub use auth::{RegistryAuth, RegistryCredentials};
pub use builder::{BuildSpec, ImageBuilder};
pub use client::connect;
pub use engine_api::{EngineApi, PluginDetails};
pub use duration::{parse_duration, parse_nanos};
pub use error::*;
pub use image::{ImageManager, split_image_tag};
pub use logs::{LogRequest, read_logs};
pub use project::{ComposeProject, ServiceStatus, UpOptions};
pub use waiter::{ConvergeConfig, Convergence, wait_for_convergence};

pub use bollard::Docker;
