//! Bollard が持たない Engine API（`/configs` と `/plugins/{name}/json`）
//!
//! Docker Engine と同じ接続先へ直接 HTTP を送る。Unix ソケットは hyperlocal、
//! TCP は reqwest（TLS 時は相互 TLS）を使う。

use crate::client::{HostKind, parse_host};
use crate::error::{EngineError, Result};
use bollard::models::{Config, ConfigSpec, IdResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use hyperlocal::UnixConnector;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tfdocker_config::{DockerEndpoint, TlsMaterial};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

enum Transport {
    Unix {
        client: Client<UnixConnector, Full<Bytes>>,
        socket: PathBuf,
    },
    Tcp {
        client: reqwest::Client,
        base: Url,
    },
}

/// インストール済みプラグインの状態
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginDetails {
    pub id: Option<String>,
    pub name: String,
    pub enabled: bool,
    pub plugin_reference: Option<String>,
    #[serde(default)]
    pub settings: PluginSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginSettings {
    pub env: Option<Vec<String>>,
}

/// Swarm コンフィグとプラグインの API クライアント
pub struct EngineApi {
    transport: Transport,
}

#[derive(Deserialize)]
struct EngineMessage {
    message: String,
}

impl EngineApi {
    /// Docker クライアントと同じ `host` と TLS 設定から作る
    pub fn new(endpoint: &DockerEndpoint) -> Result<Self> {
        let transport = match parse_host(&endpoint.host)? {
            HostKind::Unix(path) => Transport::Unix {
                client: Client::builder(TokioExecutor::new()).build(UnixConnector),
                socket: PathBuf::from(path),
            },
            HostKind::Tcp(addr) => {
                let (client, scheme) = match &endpoint.tls {
                    Some(tls) => (tls_client(tls)?, "https"),
                    None => (plain_client()?, "http"),
                };
                let base = Url::parse(&format!("{}://{}/", scheme, addr))
                    .map_err(|e| EngineError::UnsupportedHost(format!("{}: {}", endpoint.host, e)))?;
                Transport::Tcp { client, base }
            }
        };
        Ok(Self { transport })
    }

    pub async fn create_config(&self, spec: &ConfigSpec) -> Result<String> {
        let body = serde_json::to_vec(spec)?;
        let created: IdResponse = self
            .call(Method::POST, &["configs", "create"], None, Some(body))
            .await?;
        Ok(created.id)
    }

    pub async fn inspect_config(&self, id: &str) -> Result<Config> {
        self.call(Method::GET, &["configs", id], None, None).await
    }

    /// `version` は inspect で得た現在のバージョン番号。ラベルのみ変更できる
    pub async fn update_config(&self, id: &str, version: u64, spec: &ConfigSpec) -> Result<()> {
        let body = serde_json::to_vec(spec)?;
        let version = version.to_string();
        self.send(
            Method::POST,
            &["configs", id, "update"],
            Some(("version", version.as_str())),
            Some(body),
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_config(&self, id: &str) -> Result<()> {
        self.send(Method::DELETE, &["configs", id], None, None)
            .await
            .map(|_| ())
    }

    /// 名前（`vieux/sshfs` のような `/` 入りも可）または ID でプラグインを参照する
    pub async fn inspect_plugin(&self, name: &str) -> Result<PluginDetails> {
        let mut segments = vec!["plugins"];
        segments.extend(name.split('/'));
        segments.push("json");
        self.call(Method::GET, &segments, None, None).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: Option<(&str, &str)>,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let bytes = self.send(method, segments, query, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// リクエストを送り、2xx ならボディを返す
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: Option<(&str, &str)>,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes> {
        let url = request_url(
            match &self.transport {
                Transport::Tcp { base, .. } => base.clone(),
                Transport::Unix { .. } => Url::parse("http://docker/").map_err(api_error)?,
            },
            segments,
            query,
        )?;
        tracing::debug!("{} {}", method, url.path());

        let (status, bytes) = match &self.transport {
            Transport::Tcp { client, .. } => {
                let mut request = client.request(method, url);
                if let Some(body) = body {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body);
                }
                let response = request.send().await.map_err(api_error)?;
                let status = response.status().as_u16();
                (status, response.bytes().await.map_err(api_error)?)
            }
            Transport::Unix { client, socket } => {
                let path = match url.query() {
                    Some(query) => format!("{}?{}", url.path(), query),
                    None => url.path().to_string(),
                };
                let request = hyper::Request::builder()
                    .method(method)
                    .uri(hyper::Uri::from(hyperlocal::Uri::new(socket, &path)))
                    .header(hyper::header::CONTENT_TYPE, "application/json")
                    .body(Full::new(Bytes::from(body.unwrap_or_default())))
                    .map_err(api_error)?;
                let response = client.request(request).await.map_err(|e| {
                    EngineError::ConnectionFailed(format!("{}: {}", socket.display(), e))
                })?;
                let status = response.status().as_u16();
                let bytes = response
                    .into_body()
                    .collect()
                    .await
                    .map_err(api_error)?
                    .to_bytes();
                (status, bytes)
            }
        };

        check_status(status, bytes)
    }
}

fn plain_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(api_error)
}

fn tls_client(tls: &TlsMaterial) -> Result<reqwest::Client> {
    let files = tls.materialize()?;
    let ca = reqwest::Certificate::from_pem(&std::fs::read(&files.ca)?).map_err(api_error)?;
    let mut identity = std::fs::read(&files.cert)?;
    identity.push(b'\n');
    identity.extend(std::fs::read(&files.key)?);
    let identity = reqwest::Identity::from_pem(&identity).map_err(api_error)?;

    reqwest::Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .add_root_certificate(ca)
        .identity(identity)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(api_error)
}

fn request_url(mut url: Url, segments: &[&str], query: Option<(&str, &str)>) -> Result<Url> {
    url.path_segments_mut()
        .map_err(|_| EngineError::Api("base URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    if let Some((key, value)) = query {
        url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
}

/// Engine のステータスコードを [`EngineError`] に揃える
fn check_status(status: u16, body: Bytes) -> Result<Bytes> {
    if (200..300).contains(&status) {
        return Ok(body);
    }
    let message = serde_json::from_slice::<EngineMessage>(&body)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
    Err(match status {
        404 => EngineError::NotFound(message),
        409 => EngineError::Conflict(message),
        304 => EngineError::NotModified,
        _ => EngineError::Api(format!("status {}: {}", status, message)),
    })
}

fn api_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Api(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> EngineApi {
        EngineApi::new(&DockerEndpoint {
            host: server.uri(),
            tls: None,
        })
        .unwrap()
    }

    #[test]
    fn test_request_url_escapes_segments() {
        let base = Url::parse("http://docker/").unwrap();
        let url = request_url(base, &["configs", "nginx conf", "update"], Some(("version", "12")))
            .unwrap();
        assert_eq!(url.path(), "/configs/nginx%20conf/update");
        assert_eq!(url.query(), Some("version=12"));
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200, Bytes::new()).is_ok());
        assert!(matches!(
            check_status(404, Bytes::from_static(br#"{"message":"config nginx not found"}"#)),
            Err(EngineError::NotFound(m)) if m == "config nginx not found"
        ));
        assert!(matches!(
            check_status(409, Bytes::from_static(b"name conflicts")),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            check_status(500, Bytes::new()),
            Err(EngineError::Api(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_inspect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/configs/create"))
            .and(body_partial_json(serde_json::json!({"Name": "nginx.conf"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"ID": "cfg1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/configs/cfg1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ID": "cfg1",
                "Version": {"Index": 11},
                "Spec": {"Name": "nginx.conf", "Data": "d29ya2VyX3Byb2Nlc3NlcyAxOw=="}
            })))
            .mount(&server)
            .await;

        let api = api(&server);
        let spec = ConfigSpec {
            name: Some("nginx.conf".to_string()),
            ..Default::default()
        };
        assert_eq!(api.create_config(&spec).await.unwrap(), "cfg1");

        let config = api.inspect_config("cfg1").await.unwrap();
        assert_eq!(config.version.and_then(|v| v.index), Some(11));
        assert_eq!(config.spec.and_then(|s| s.name).as_deref(), Some("nginx.conf"));
    }

    #[tokio::test]
    async fn test_update_sends_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/configs/cfg1/update"))
            .and(query_param("version", "11"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .update_config("cfg1", 11, &ConfigSpec::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_config_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/configs/gone"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"message": "config gone not found"})),
            )
            .mount(&server)
            .await;

        let err = api(&server).delete_config("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_inspect_plugin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/vieux/sshfs:latest/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Id": "5724e2c8652da337ab2eedd19fc6fc0ec908e4bd907c7421bf6a8dfc70c4c078",
                "Name": "vieux/sshfs:latest",
                "Enabled": false,
                "PluginReference": "docker.io/vieux/sshfs:latest",
                "Settings": {"Env": ["DEBUG=0"], "Mounts": [], "Args": [], "Devices": []},
                "Config": {"Description": "sshFS plugin for Docker"}
            })))
            .mount(&server)
            .await;

        let plugin = api(&server).inspect_plugin("vieux/sshfs:latest").await.unwrap();
        assert!(!plugin.enabled);
        assert_eq!(plugin.settings.env, Some(vec!["DEBUG=0".to_string()]));
        assert_eq!(
            plugin.plugin_reference.as_deref(),
            Some("docker.io/vieux/sshfs:latest")
        );
    }
}
