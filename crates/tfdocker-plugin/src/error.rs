//! プラグインプロトコルのエラー型

use thiserror::Error;

/// プラグインプロトコルのデコード、エンコード、サーブ中のエラー
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("This binary is a plugin. These are not meant to be executed directly.\nPlease execute the program that consumes these plugins, which will\nload any plugins automatically")]
    NotLaunchedByHost,

    #[error("Unsupported plugin protocol versions offered by host: {0}")]
    UnsupportedProtocol(String),

    #[error("Failed to decode value: {0}")]
    Decode(String),

    #[error("Failed to encode value: {0}")]
    Encode(String),

    #[error("Unknown type name: {0}")]
    UnknownType(String),

    #[error("Certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;
