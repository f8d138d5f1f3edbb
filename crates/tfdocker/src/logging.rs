//! ログ出力の初期化
//!
//! Terraform はプロバイダーの stderr をログとして取り込む。レベルは
//! `TF_LOG_PROVIDER`、`TF_LOG`、`RUST_LOG` の順に参照し、どれもなければ `info`。

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Terraform のログレベルを tracing のレベルに変換
fn terraform_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

/// 環境変数からフィルタ指定を決める
pub fn filter_directive() -> String {
    for var in ["TF_LOG_PROVIDER", "TF_LOG"] {
        if let Some(level) = std::env::var(var).ok().as_deref().and_then(terraform_level) {
            return level.to_string();
        }
    }

    match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.trim().is_empty() => directive,
        _ => DEFAULT_LEVEL.to_string(),
    }
}

pub fn init() {
    let filter =
        EnvFilter::try_new(filter_directive()).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 3] = ["TF_LOG_PROVIDER", "TF_LOG", "RUST_LOG"];

    #[test]
    fn test_terraform_level() {
        assert_eq!(terraform_level("DEBUG"), Some("debug"));
        assert_eq!(terraform_level("json"), Some("trace"));
        assert_eq!(terraform_level("off"), None);
    }

    #[test]
    #[serial]
    fn test_default_level() {
        temp_env::with_vars_unset(VARS, || {
            assert_eq!(filter_directive(), "info");
        });
    }

    #[test]
    #[serial]
    fn test_provider_level_wins() {
        temp_env::with_vars(
            [
                ("TF_LOG_PROVIDER", Some("ERROR")),
                ("TF_LOG", Some("TRACE")),
                ("RUST_LOG", Some("debug")),
            ],
            || {
                assert_eq!(filter_directive(), "error");
            },
        );
    }

    #[test]
    #[serial]
    fn test_rust_log_fallback() {
        temp_env::with_vars(
            [
                ("TF_LOG_PROVIDER", None),
                ("TF_LOG", Some("bogus")),
                ("RUST_LOG", Some("tfdocker=debug")),
            ],
            || {
                assert_eq!(filter_directive(), "tfdocker=debug");
            },
        );
    }
}
