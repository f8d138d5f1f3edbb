use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("compose_file または compose_content のどちらかを指定してください")]
    MissingSource,

    #[error("Compose ファイルを読み込めません: {path}\n理由: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML パースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("サービス '{service}' のポート指定が不正です: {spec}")]
    InvalidPort { service: String, spec: String },

    #[error("サービス '{service}' のボリューム指定が不正です: {spec}")]
    InvalidVolume { service: String, spec: String },

    #[error("サービス '{service}' が未定義のサービス '{dependency}' に依存しています")]
    UnknownDependency { service: String, dependency: String },

    #[error("循環依存が検出されました: {0}")]
    CircularDependency(String),
}

pub type Result<T> = std::result::Result<T, ComposeError>;
