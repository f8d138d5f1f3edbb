use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "tls_verify が有効な場合は cert_path、または ca_cert・cert・key の全てを指定してください"
    )]
    MissingTlsConfiguration,

    #[error("TLS 証明書が見つかりません: {0}")]
    CertificateNotFound(String),

    #[error("Docker 設定ファイルの解析に失敗しました: {0}")]
    DockerConfigParse(String),

    #[error("ホームディレクトリが見つかりません")]
    HomeDirNotFound,

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
