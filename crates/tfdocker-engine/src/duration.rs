//! `30s`, `1m30s`, `500ms` 形式の期間指定
//!
//! 単位は `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`。小数と複数単位の連結を受け付ける。
//! 単位なしは `0` のみ許可する。

use crate::error::{EngineError, Result};
use std::time::Duration;

pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(EngineError::InvalidDuration(input.to_string()));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || EngineError::InvalidDuration(input.to_string());
    let mut total_nanos: f64 = 0.0;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Swarm API が使うナノ秒表現
pub fn parse_nanos(input: &str) -> Result<i64> {
    let duration = parse_duration(input)?;
    i64::try_from(duration.as_nanos()).map_err(|_| EngineError::InvalidDuration(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration("7s").unwrap(), Duration::from_secs(7));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid() {
        for input in ["", "10", "s", "1x", "1.2.3s", "-1s"] {
            assert!(parse_duration(input).is_err(), "{} should fail", input);
        }
    }

    #[test]
    fn test_nanos() {
        assert_eq!(parse_nanos("30s").unwrap(), 30_000_000_000);
    }
}
