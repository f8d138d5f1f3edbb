//! コンテナログの取得
//!
//! Docker はマルチプレクスされたログを 8 バイトのヘッダ付きで返す:
//!
//! ```text
//! [stream, 0, 0, 0, size(4 bytes, big endian)] payload
//! ```
//!
//! Bollard はヘッダを取り除いた [`LogOutput`] を返すため、
//! ヘッダを残す指定のときはここで組み立て直す。

use crate::duration::parse_duration;
use crate::error::{EngineError, Result};
use bollard::Docker;
use bollard::container::LogOutput;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;

/// ログ取得の条件
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub container: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub tail: String,
    pub timestamps: bool,
    pub show_stdout: bool,
    pub show_stderr: bool,
    pub follow: bool,
    pub discard_headers: bool,
}

impl Default for LogRequest {
    fn default() -> Self {
        Self {
            container: String::new(),
            since: None,
            until: None,
            tail: "all".to_string(),
            timestamps: false,
            show_stdout: true,
            show_stderr: true,
            follow: false,
            discard_headers: true,
        }
    }
}

/// `since` / `until` を Unix 秒に変換
///
/// RFC3339、Unix 秒、または現在からの相対期間（`10m` なら 10 分前）を受け付ける。
pub fn parse_timestamp(input: &str, now: DateTime<Utc>) -> Result<i64> {
    let s = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.timestamp());
    }
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(ago) = parse_duration(s) {
        let ago = chrono::Duration::from_std(ago)
            .map_err(|_| EngineError::InvalidTimestamp(input.to_string()))?;
        return Ok((now - ago).timestamp());
    }
    Err(EngineError::InvalidTimestamp(input.to_string()))
}

/// ストリーム種別のヘッダを付けて書き出す
pub fn frame(stream_type: u8, payload: &[u8], out: &mut Vec<u8>) {
    out.push(stream_type);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
}

fn append_output(output: LogOutput, discard_headers: bool, out: &mut Vec<u8>) {
    let (stream_type, message) = match output {
        LogOutput::StdIn { message } => (Some(0), message),
        LogOutput::StdOut { message } => (Some(1), message),
        LogOutput::StdErr { message } => (Some(2), message),
        // TTY 付きコンテナはヘッダなしの生ストリーム
        LogOutput::Console { message } => (None, message),
    };

    match stream_type {
        Some(kind) if !discard_headers => frame(kind, &message, out),
        _ => out.extend_from_slice(&message),
    }
}

/// ログを読み込み、文字列として返す
pub async fn read_logs(docker: &Docker, request: &LogRequest) -> Result<String> {
    let now = Utc::now();
    let since = match &request.since {
        Some(s) if !s.is_empty() => parse_timestamp(s, now)?,
        _ => 0,
    };
    let until = match &request.until {
        Some(s) if !s.is_empty() => parse_timestamp(s, now)?,
        _ => 0,
    };

    #[allow(deprecated)]
    let options = bollard::container::LogsOptions::<String> {
        follow: request.follow,
        stdout: request.show_stdout,
        stderr: request.show_stderr,
        since,
        until,
        timestamps: request.timestamps,
        tail: request.tail.clone(),
    };

    tracing::debug!("Reading logs of {}", request.container);

    #[allow(deprecated)]
    let mut stream = docker.logs(&request.container, Some(options));

    let mut raw = Vec::new();
    while let Some(result) = stream.next().await {
        append_output(result?, request.discard_headers, &mut raw);
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("2024-05-01T11:00:00Z", now()).unwrap(),
            now().timestamp() - 3600
        );
        assert_eq!(parse_timestamp("1714560000", now()).unwrap(), 1714560000);
        assert_eq!(
            parse_timestamp("10m", now()).unwrap(),
            now().timestamp() - 600
        );
        assert!(parse_timestamp("yesterday", now()).is_err());
    }

    #[test]
    fn test_frame_header() {
        let mut out = Vec::new();
        frame(2, b"oops\n", &mut out);
        assert_eq!(&out[..8], &[2, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(&out[8..], b"oops\n");
    }

    #[test]
    fn test_append_output_headers() {
        let mut raw = Vec::new();
        append_output(
            LogOutput::StdOut {
                message: Bytes::from_static(b"hello\n"),
            },
            false,
            &mut raw,
        );
        assert_eq!(raw.len(), 8 + 6);
        assert_eq!(raw[0], 1);

        let mut stripped = Vec::new();
        append_output(
            LogOutput::StdErr {
                message: Bytes::from_static(b"warn\n"),
            },
            true,
            &mut stripped,
        );
        assert_eq!(stripped, b"warn\n");
    }

    #[test]
    fn test_console_never_framed() {
        let mut raw = Vec::new();
        append_output(
            LogOutput::Console {
                message: Bytes::from_static(b"tty\n"),
            },
            false,
            &mut raw,
        );
        assert_eq!(raw, b"tty\n");
    }
}
