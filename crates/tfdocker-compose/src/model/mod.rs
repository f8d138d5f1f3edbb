//! Compose ファイルのモデル
//!
//! 短縮記法と詳細記法の違いはパース時に吸収し、
//! ここでは正規化済みの形だけを扱う。

mod port;
mod service;
mod volume;

pub use port::*;
pub use service::*;
pub use volume::*;

use std::collections::BTreeMap;

/// Compose ファイル全体
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeFile {
    pub services: BTreeMap<String, Service>,
    pub networks: BTreeMap<String, NetworkDefinition>,
    pub volumes: BTreeMap<String, VolumeDefinition>,
}

/// トップレベルの `networks` エントリ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkDefinition {
    pub driver: Option<String>,
    /// 外部で管理されるネットワーク。作成も削除もしない
    pub external: bool,
}

/// トップレベルの `volumes` エントリ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeDefinition {
    pub driver: Option<String>,
    pub external: bool,
}

impl ComposeFile {
    /// サービス名の一覧（名前順）
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// いずれかのサービスが既定ネットワークを使うか
    pub fn uses_default_network(&self) -> bool {
        self.services.values().any(|s| s.networks.is_empty())
    }
}
