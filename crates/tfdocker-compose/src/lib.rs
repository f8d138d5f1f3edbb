//! Compose ファイルの解釈
//!
//! docker compose の CLI を使わずに Compose プロジェクトを Engine API で
//! 再現するため、Compose ファイルのうち必要な部分だけをモデル化する。
//!
//! - [`parser`]: YAML を [`ComposeFile`] に変換
//! - [`order`]: `depends_on` に従った起動順序
//! - [`project`]: プロジェクト単位の命名とラベル
//! - [`hash`]: 変更検出用のコンテンツハッシュ

pub mod error;
pub mod hash;
pub mod model;
pub mod order;
pub mod parser;
pub mod project;

pub use error::*;
pub use hash::content_hash;
pub use model::*;
pub use order::service_order;
pub use parser::{ComposeSource, parse_compose};
pub use project::*;
