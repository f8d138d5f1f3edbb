//! Terraform プラグインフレームワーク
//!
//! プラグインプロトコル v6 で Terraform プロバイダーをサーブする。
//! HashiCorp の plugin framework の形に倣い、Docker リソースの
//! プロバイダーに必要な部分だけを持つ。
//!
//! # 概要
//!
//! - **プロトコル**: 同梱の proto から生成した `tfplugin6` と go-plugin
//!   コントローラーの型
//! - **値**: msgpack / JSON コーデックを持つ cty 値と `serde` モデルとの変換
//! - **スキーマ**: 属性とブロックのビルダー。デフォルト値、置き換え、
//!   安定した computed 値といったプラン時の振る舞いも持つ
//! - **トレイト**: [`Provider`]、[`Resource`]、[`DataSource`]
//! - **サーバー**: ハンドシェイク、AutoMTLS、[`serve`] による gRPC サービス
//!
//! # アーキテクチャ
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        Terraform core        │
//! └──────────────┬───────────────┘
//!                │ gRPC (tfplugin6)
//! ┌──────────────▼───────────────┐
//! │        PluginService         │
//! │  decode ─ plan ─ dispatch    │
//! └──────────────┬───────────────┘
//!                │ Value + Diagnostics
//! ┌──────────────▼───────────────┐
//! │  Provider / Resource /       │
//! │  DataSource implementations  │
//! └──────────────────────────────┘
//! ```

pub mod diagnostics;
pub mod error;
pub mod handshake;
pub mod plan;
pub mod resource;
pub mod schema;
pub mod serve;
pub mod server;
pub mod types;
pub mod value;

/// 生成されたプロトコル型
#[allow(clippy::all)]
pub mod generated {
    /// Terraform プラグインプロトコル v6
    pub mod tfplugin6 {
        tonic::include_proto!("tfplugin6");
    }

    /// go-plugin コントローラー
    pub mod plugin {
        tonic::include_proto!("plugin");
    }
}

// 再エクスポート
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{PluginError, Result};
pub use resource::{DataSource, Provider, Resource, decode, encode};
pub use schema::{Attribute, Block, NestedBlock, Nesting, Schema};
pub use serve::{ServeOptions, serve};
pub use server::PluginService;
pub use types::Type;
pub use value::Value;

pub use async_trait::async_trait;
