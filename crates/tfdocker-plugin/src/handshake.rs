//! Terraform がプロバイダーを起動するときの go-plugin ハンドシェイク
//!
//! Terraform は環境変数にマジッククッキーを設定してプロバイダーを起動し、
//! 標準出力からハンドシェイク行を 1 行だけ読む:
//!
//! ```text
//! 1|6|tcp|127.0.0.1:PORT|grpc|BASE64_CERT
//! ```
//!
//! 形式: `CORE_VERSION|APP_VERSION|NETWORK|ADDRESS|PROTOCOL[|SERVER_CERT]`
//! 証明書フィールドは Terraform が `PLUGIN_CLIENT_CERT` で AutoMTLS を
//! 要求したときだけ付く。

use crate::error::{PluginError, Result};
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// go-plugin のコアプロトコルバージョン
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Terraform プラグインプロトコルのバージョン
pub const PROTOCOL_VERSION: u32 = 6;

/// Terraform から起動されていなければ実行を拒否する
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(PluginError::NotLaunchedByHost),
    }
}

/// ホストがプロトコル 6 を提示しているか確認する。変数が無いのは
/// バージョン交渉以前のホストで、こちらのバージョンを前提としている
pub fn negotiate_protocol() -> Result<u32> {
    let Ok(offered) = std::env::var("PLUGIN_PROTOCOL_VERSIONS") else {
        return Ok(PROTOCOL_VERSION);
    };

    let supported = offered
        .split(',')
        .filter_map(|v| v.trim().parse::<u32>().ok())
        .any(|v| v == PROTOCOL_VERSION);

    if supported {
        Ok(PROTOCOL_VERSION)
    } else {
        Err(PluginError::UnsupportedProtocol(offered))
    }
}

/// ホストが `PLUGIN_MIN_PORT`/`PLUGIN_MAX_PORT` で指定したポート範囲
pub fn port_range() -> Option<(u16, u16)> {
    let min = std::env::var("PLUGIN_MIN_PORT").ok()?.parse::<u16>().ok()?;
    let max = std::env::var("PLUGIN_MAX_PORT").ok()?.parse::<u16>().ok()?;
    (min <= max).then_some((min, max))
}

/// ループバックで待ち受ける。範囲指定があればその中で
pub async fn bind_listener() -> Result<TcpListener> {
    let Some((min, max)) = port_range() else {
        return Ok(TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?);
    };

    for port in min..=max {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => tracing::trace!("port {} unavailable: {}", port, e),
        }
    }

    Err(PluginError::Io(std::io::Error::new(
        std::io::ErrorKind::AddrInUse,
        format!("no free port between {} and {}", min, max),
    )))
}

/// AutoMTLS 用の自己署名サーバー証明書
#[derive(Debug, Clone)]
pub struct ServerCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: Vec<u8>,
}

impl ServerCertificate {
    /// ハンドシェイク行の証明書フィールド
    pub fn handshake_field(&self) -> String {
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(&self.der)
    }
}

/// `localhost` 向けの証明書を生成する。Terraform がルートとして固定できるよう
/// go-plugin 自身が作るものと同じ形にする
pub fn generate_certificate() -> Result<ServerCertificate> {
    let key = KeyPair::generate()?;

    let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
    params
        .distinguished_name
        .push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let cert = params.self_signed(&key)?;

    Ok(ServerCertificate {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        der: cert.der().to_vec(),
    })
}

/// Terraform が標準出力から読む行
pub fn handshake_line(addr: SocketAddr, cert: Option<&ServerCertificate>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    );
    if let Some(cert) = cert {
        line.push('|');
        line.push_str(&cert.handshake_field());
    }
    line
}

/// `--debug` で起動したプロバイダーの `TF_REATTACH_PROVIDERS` 値
pub fn reattach_config(provider_address: &str, addr: SocketAddr, pid: u32) -> serde_json::Value {
    let entry = serde_json::json!({
        "Protocol": "grpc",
        "ProtocolVersion": PROTOCOL_VERSION,
        "Pid": pid,
        "Test": true,
        "Addr": {
            "Network": "tcp",
            "String": addr.to_string(),
        }
    });

    let mut providers = serde_json::Map::new();
    providers.insert(provider_address.to_string(), entry);
    serde_json::Value::Object(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_magic_cookie() {
        temp_env::with_var(MAGIC_COOKIE_KEY, Some(MAGIC_COOKIE_VALUE), || {
            assert!(check_magic_cookie().is_ok());
        });
        temp_env::with_var(MAGIC_COOKIE_KEY, Some("nope"), || {
            assert!(matches!(
                check_magic_cookie(),
                Err(PluginError::NotLaunchedByHost)
            ));
        });
        temp_env::with_var_unset(MAGIC_COOKIE_KEY, || {
            assert!(check_magic_cookie().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_protocol_negotiation() {
        temp_env::with_var("PLUGIN_PROTOCOL_VERSIONS", Some("5,6"), || {
            assert_eq!(negotiate_protocol().unwrap(), 6);
        });
        temp_env::with_var("PLUGIN_PROTOCOL_VERSIONS", Some("5"), || {
            assert!(matches!(
                negotiate_protocol(),
                Err(PluginError::UnsupportedProtocol(_))
            ));
        });
        temp_env::with_var_unset("PLUGIN_PROTOCOL_VERSIONS", || {
            assert_eq!(negotiate_protocol().unwrap(), 6);
        });
    }

    #[test]
    #[serial]
    fn test_port_range() {
        temp_env::with_vars(
            [
                ("PLUGIN_MIN_PORT", Some("10000")),
                ("PLUGIN_MAX_PORT", Some("25000")),
            ],
            || assert_eq!(port_range(), Some((10000, 25000))),
        );
        temp_env::with_vars(
            [
                ("PLUGIN_MIN_PORT", Some("25000")),
                ("PLUGIN_MAX_PORT", Some("10000")),
            ],
            || assert_eq!(port_range(), None),
        );
        temp_env::with_vars_unset(["PLUGIN_MIN_PORT", "PLUGIN_MAX_PORT"], || {
            assert_eq!(port_range(), None)
        });
    }

    #[test]
    fn test_handshake_line() {
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        assert_eq!(handshake_line(addr, None), "1|6|tcp|127.0.0.1:1234|grpc");

        let cert = ServerCertificate {
            cert_pem: String::new(),
            key_pem: String::new(),
            der: vec![0xde, 0xad, 0xbe, 0xef],
        };
        // パディングなし
        assert_eq!(
            handshake_line(addr, Some(&cert)),
            "1|6|tcp|127.0.0.1:1234|grpc|3q2+7w"
        );
    }

    #[test]
    fn test_generate_certificate() {
        let cert = generate_certificate().unwrap();
        assert!(cert.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(cert.key_pem.contains("PRIVATE KEY"));
        assert!(!cert.der.is_empty());
        assert!(!cert.handshake_field().ends_with('='));
    }

    #[test]
    fn test_reattach_config() {
        let addr: SocketAddr = "127.0.0.1:4321".parse().unwrap();
        let config = reattach_config("registry.terraform.io/chronista-club/docker", addr, 42);
        let entry = &config["registry.terraform.io/chronista-club/docker"];
        assert_eq!(entry["ProtocolVersion"], 6);
        assert_eq!(entry["Pid"], 42);
        assert_eq!(entry["Addr"]["String"], "127.0.0.1:4321");
    }

    #[tokio::test]
    #[serial]
    async fn test_bind_listener_in_range() {
        let (min, max) = (38_100u16, 38_199u16);
        unsafe {
            std::env::set_var("PLUGIN_MIN_PORT", min.to_string());
            std::env::set_var("PLUGIN_MAX_PORT", max.to_string());
        }

        let listener = bind_listener().await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!((min..=max).contains(&port));

        unsafe {
            std::env::remove_var("PLUGIN_MIN_PORT");
            std::env::remove_var("PLUGIN_MAX_PORT");
        }
    }
}
