use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(
        "Docker デーモンに接続できません: {0}\n\nヒント:\n  • Docker が起動しているか確認してください\n  • host と TLS 設定を確認してください"
    )]
    ConnectionFailed(String),

    #[error("サポートされていないホスト指定です: {0}")]
    UnsupportedHost(String),

    #[error("オブジェクトが見つかりません: {0}")]
    NotFound(String),

    #[error("オブジェクトが競合しています: {0}")]
    Conflict(String),

    #[error("変更はありません")]
    NotModified,

    #[error("Docker API エラー: {0}")]
    Api(String),

    #[error("イメージの pull に失敗しました: {0}")]
    PullFailed(String),

    #[error("イメージの push に失敗しました: {0}")]
    PushFailed(String),

    #[error("イメージのビルドに失敗しました: {0}")]
    BuildFailed(String),

    #[error("Dockerfile が見つかりません: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("ビルドコンテキストが見つかりません: {0}")]
    ContextNotFound(PathBuf),

    #[error("レジストリ '{registry}' の認証に失敗しました: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("不正な期間指定です: {0}")]
    InvalidDuration(String),

    #[error("不正な時刻指定です: {0}")]
    InvalidTimestamp(String),

    #[error("不正な設定です: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] tfdocker_config::ConfigError),

    #[error(transparent)]
    Compose(#[from] tfdocker_compose::ComposeError),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON の変換に失敗しました: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// 404 由来のエラーか
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => EngineError::NotFound(message.clone()),
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => EngineError::Conflict(message.clone()),
            bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            } => EngineError::NotModified,
            _ => {
                // 接続エラーの可能性をチェック
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                {
                    EngineError::ConnectionFailed(err_str)
                } else {
                    EngineError::Api(err_str)
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// 404 を `None` に変換する
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 404 を成功として扱う（削除系の操作向け）
pub fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
