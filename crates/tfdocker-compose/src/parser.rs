//! Compose YAML パーサー
//!
//! YAML をいったん「生」の形（短縮記法と詳細記法の両方を受ける enum）で
//! 受け取り、[`ComposeFile`] に正規化する。未対応のキーは無視する。

use crate::error::{ComposeError, Result};
use crate::model::{
    ComposeFile, MountKind, NetworkDefinition, PortMapping, Protocol, Service, ServiceVolume,
    VolumeDefinition,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Compose ファイルの取得元
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeSource {
    File(PathBuf),
    Content(String),
}

impl ComposeSource {
    /// compose_file / compose_content 属性から取得元を決める。ファイルが優先
    pub fn from_attributes(file: Option<&str>, content: Option<&str>) -> Result<Self> {
        match (file, content) {
            (Some(path), _) => Ok(ComposeSource::File(PathBuf::from(path))),
            (None, Some(content)) => Ok(ComposeSource::Content(content.to_string())),
            (None, None) => Err(ComposeError::MissingSource),
        }
    }

    /// YAML テキストを読み込む
    pub fn read(&self) -> Result<String> {
        match self {
            ComposeSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| ComposeError::Read {
                    path: path.clone(),
                    source,
                })
            }
            ComposeSource::Content(content) => Ok(content.clone()),
        }
    }

    /// 読み込んでパース
    pub fn load(&self) -> Result<ComposeFile> {
        parse_compose(&self.read()?)
    }
}

// ============ 生の YAML 形 ============

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    services: BTreeMap<String, Option<RawService>>,
    #[serde(default)]
    networks: BTreeMap<String, Option<RawResource>>,
    #[serde(default)]
    volumes: BTreeMap<String, Option<RawResource>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawService {
    image: Option<String>,
    command: Option<RawCommand>,
    entrypoint: Option<RawCommand>,
    environment: Option<RawMapping>,
    #[serde(default)]
    ports: Vec<RawPort>,
    #[serde(default)]
    volumes: Vec<RawVolume>,
    networks: Option<RawNames>,
    depends_on: Option<RawNames>,
    restart: Option<String>,
    hostname: Option<String>,
    working_dir: Option<String>,
    user: Option<String>,
    privileged: Option<bool>,
    labels: Option<RawMapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResource {
    driver: Option<String>,
    /// `true` または旧形式の `{ name: ... }`
    external: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Shell(String),
    Exec(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    String(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMapping {
    Map(BTreeMap<String, Option<Scalar>>),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNames {
    List(Vec<String>),
    Map(BTreeMap<String, serde_yaml::Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Short(String),
    Number(u16),
    Long {
        target: u16,
        published: Option<Scalar>,
        protocol: Option<String>,
        host_ip: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Short(String),
    Long {
        #[serde(rename = "type")]
        kind: Option<String>,
        source: Option<String>,
        target: String,
        read_only: Option<bool>,
    },
}

// ============ 正規化 ============

/// YAML 文字列をパース
pub fn parse_compose(content: &str) -> Result<ComposeFile> {
    let raw = if content.trim().is_empty() {
        RawFile::default()
    } else {
        // コメントだけの文書は null になる
        serde_yaml::from_str::<Option<RawFile>>(content)?.unwrap_or_default()
    };

    let mut services = BTreeMap::new();
    for (name, service) in raw.services {
        let service = convert_service(&name, service.unwrap_or_default())?;
        services.insert(name, service);
    }

    let networks = raw
        .networks
        .into_iter()
        .map(|(name, def)| {
            let def = def.unwrap_or_default();
            let network = NetworkDefinition {
                external: is_external(def.external.as_ref()),
                driver: def.driver,
            };
            (name, network)
        })
        .collect();

    let volumes = raw
        .volumes
        .into_iter()
        .map(|(name, def)| {
            let def = def.unwrap_or_default();
            let volume = VolumeDefinition {
                external: is_external(def.external.as_ref()),
                driver: def.driver,
            };
            (name, volume)
        })
        .collect();

    tracing::debug!(services = services.len(), "Compose ファイルをパースしました");

    Ok(ComposeFile {
        services,
        networks,
        volumes,
    })
}

fn convert_service(name: &str, raw: RawService) -> Result<Service> {
    let ports = raw
        .ports
        .into_iter()
        .map(|p| parse_port(name, p))
        .collect::<Result<Vec<_>>>()?;
    let volumes = raw
        .volumes
        .into_iter()
        .map(|v| parse_volume(name, v))
        .collect::<Result<Vec<_>>>()?;

    Ok(Service {
        image: raw.image,
        command: raw.command.map(command_args),
        entrypoint: raw.entrypoint.map(command_args),
        environment: raw.environment.map(mapping).unwrap_or_default(),
        ports,
        volumes,
        networks: raw.networks.map(names).unwrap_or_default(),
        depends_on: raw.depends_on.map(names).unwrap_or_default(),
        restart: raw.restart,
        hostname: raw.hostname,
        working_dir: raw.working_dir,
        user: raw.user,
        privileged: raw.privileged.unwrap_or(false),
        labels: raw.labels.map(mapping).unwrap_or_default(),
    })
}

/// 文字列形式のコマンドは空白で分割する
fn command_args(raw: RawCommand) -> Vec<String> {
    match raw {
        RawCommand::Shell(cmd) => cmd.split_whitespace().map(String::from).collect(),
        RawCommand::Exec(args) => args,
    }
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::String(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// map 形式と `KEY=VALUE` のリスト形式を同じ形にする。値のないキーは捨てる
fn mapping(raw: RawMapping) -> BTreeMap<String, String> {
    match raw {
        RawMapping::Map(entries) => entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v.into_string())))
            .collect(),
        RawMapping::List(items) => items
            .iter()
            .filter_map(|item| item.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn names(raw: RawNames) -> Vec<String> {
    match raw {
        RawNames::List(names) => names,
        RawNames::Map(entries) => entries.into_keys().collect(),
    }
}

fn is_external(value: Option<&serde_yaml::Value>) -> bool {
    match value {
        Some(serde_yaml::Value::Bool(b)) => *b,
        Some(serde_yaml::Value::Mapping(_)) => true,
        _ => false,
    }
}

fn parse_port(service: &str, raw: RawPort) -> Result<PortMapping> {
    match raw {
        RawPort::Number(target) => Ok(PortMapping {
            target,
            ..Default::default()
        }),
        RawPort::Long {
            target,
            published,
            protocol,
            host_ip,
        } => Ok(PortMapping {
            host_ip,
            published: published.map(Scalar::into_string),
            target,
            protocol: protocol.as_deref().map(Protocol::parse).unwrap_or_default(),
        }),
        RawPort::Short(spec) => parse_port_spec(&spec).ok_or(ComposeError::InvalidPort {
            service: service.to_string(),
            spec,
        }),
    }
}

/// `[ip:][host:]container[/protocol]` 形式
fn parse_port_spec(spec: &str) -> Option<PortMapping> {
    let (address, protocol) = match spec.split_once('/') {
        Some((address, protocol)) => (address, Protocol::parse(protocol)),
        None => (spec, Protocol::Tcp),
    };

    let parts: Vec<&str> = address.rsplitn(3, ':').collect();
    let target = parts.first()?.parse::<u16>().ok()?;
    let published = parts
        .get(1)
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string());
    let host_ip = parts
        .get(2)
        .filter(|ip| !ip.is_empty())
        .map(|ip| ip.to_string());

    Some(PortMapping {
        host_ip,
        published,
        target,
        protocol,
    })
}

fn parse_volume(service: &str, raw: RawVolume) -> Result<ServiceVolume> {
    match raw {
        RawVolume::Long {
            kind,
            source,
            target,
            read_only,
        } => {
            let kind = match kind.as_deref() {
                Some("bind") => MountKind::Bind,
                Some("tmpfs") => MountKind::Tmpfs,
                _ => MountKind::Volume,
            };
            Ok(ServiceVolume {
                kind,
                source,
                target,
                read_only: read_only.unwrap_or(false),
            })
        }
        RawVolume::Short(spec) => parse_volume_spec(&spec).ok_or(ComposeError::InvalidVolume {
            service: service.to_string(),
            spec,
        }),
    }
}

/// `[source:]target[:mode]` 形式
fn parse_volume_spec(spec: &str) -> Option<ServiceVolume> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (source, target, mode) = match parts.as_slice() {
        [target] => (None, *target, None),
        [source, target] => (Some(*source), *target, None),
        [source, target, mode] => (Some(*source), *target, Some(*mode)),
        _ => return None,
    };

    if target.is_empty() {
        return None;
    }

    let kind = match source {
        Some(s) if is_host_path(s) => MountKind::Bind,
        _ => MountKind::Volume,
    };

    Some(ServiceVolume {
        kind,
        source: source.map(String::from),
        target: target.to_string(),
        read_only: mode.is_some_and(|m| m.split(',').any(|o| o == "ro")),
    })
}

fn is_host_path(source: &str) -> bool {
    source.starts_with('/') || source.starts_with('.') || source.starts_with('~')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
services:
  web:
    image: nginx:alpine
    command: nginx -g "daemon off;"
    environment:
      - MODE=prod
      - EMPTY
    ports:
      - "8080:80"
      - "127.0.0.1:8443:443/tcp"
      - "53:53/udp"
      - 9000
    volumes:
      - ./html:/usr/share/nginx/html:ro
      - cache:/var/cache/nginx
    networks:
      - front
    depends_on:
      api:
        condition: service_healthy
    restart: unless-stopped
  api:
    image: myapp:1.0
    environment:
      WORKERS: 4
      DEBUG: false
      UNSET:
    ports:
      - target: 3000
        published: 3001
        protocol: tcp
    volumes:
      - type: tmpfs
        target: /tmp
    privileged: true
networks:
  front:
    driver: overlay
  shared:
    external: true
volumes:
  cache:
  legacy:
    external:
      name: old-volume
"#;

    #[test]
    fn test_parse_services() {
        let file = parse_compose(SAMPLE).unwrap();
        assert_eq!(file.service_names(), vec!["api", "web"]);

        let web = &file.services["web"];
        assert_eq!(web.image.as_deref(), Some("nginx:alpine"));
        assert_eq!(web.restart.as_deref(), Some("unless-stopped"));
        assert_eq!(web.networks, vec!["front"]);
        assert_eq!(web.depends_on, vec!["api"]);
        assert_eq!(web.environment.get("MODE").map(String::as_str), Some("prod"));
        // 値のない KEY は無視
        assert!(!web.environment.contains_key("EMPTY"));
    }

    #[test]
    fn test_parse_environment_map_scalars() {
        let file = parse_compose(SAMPLE).unwrap();
        let api = &file.services["api"];
        assert_eq!(api.environment["WORKERS"], "4");
        assert_eq!(api.environment["DEBUG"], "false");
        assert!(!api.environment.contains_key("UNSET"));
        assert!(api.privileged);
    }

    #[test]
    fn test_parse_ports() {
        let file = parse_compose(SAMPLE).unwrap();
        let ports = &file.services["web"].ports;

        assert_eq!(ports[0].published.as_deref(), Some("8080"));
        assert_eq!(ports[0].target, 80);
        assert_eq!(ports[0].protocol, Protocol::Tcp);

        assert_eq!(ports[1].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[1].port_key(), "443/tcp");

        assert_eq!(ports[2].protocol, Protocol::Udp);

        assert_eq!(ports[3].target, 9000);
        assert!(ports[3].published.is_none());

        let api_port = &file.services["api"].ports[0];
        assert_eq!(api_port.published.as_deref(), Some("3001"));
        assert_eq!(api_port.target, 3000);
    }

    #[test]
    fn test_parse_volumes() {
        let file = parse_compose(SAMPLE).unwrap();
        let volumes = &file.services["web"].volumes;

        assert_eq!(volumes[0].kind, MountKind::Bind);
        assert_eq!(volumes[0].source.as_deref(), Some("./html"));
        assert!(volumes[0].read_only);

        assert_eq!(volumes[1].kind, MountKind::Volume);
        assert_eq!(volumes[1].source.as_deref(), Some("cache"));
        assert!(!volumes[1].read_only);

        let tmp = &file.services["api"].volumes[0];
        assert_eq!(tmp.kind, MountKind::Tmpfs);
        assert!(tmp.source.is_none());
    }

    #[test]
    fn test_parse_command() {
        let file = parse_compose(SAMPLE).unwrap();
        let command = file.services["web"].command.as_ref().unwrap();
        assert_eq!(command[0], "nginx");
        assert_eq!(command[1], "-g");
    }

    #[test]
    fn test_parse_top_level_resources() {
        let file = parse_compose(SAMPLE).unwrap();
        assert_eq!(file.networks["front"].driver.as_deref(), Some("overlay"));
        assert!(!file.networks["front"].external);
        assert!(file.networks["shared"].external);
        assert!(!file.volumes["cache"].external);
        assert!(file.volumes["legacy"].external);
    }

    #[test]
    fn test_default_network_usage() {
        let file = parse_compose(SAMPLE).unwrap();
        // api はネットワーク未指定
        assert!(file.uses_default_network());

        let only_front = parse_compose(
            "services:\n  web:\n    image: nginx\n    networks: [front]\nnetworks:\n  front: {}\n",
        )
        .unwrap();
        assert!(!only_front.uses_default_network());
    }

    #[test]
    fn test_empty_document() {
        let file = parse_compose("").unwrap();
        assert!(file.services.is_empty());
    }

    #[test]
    fn test_invalid_port() {
        let result = parse_compose("services:\n  web:\n    ports:\n      - \"abc:def\"\n");
        assert!(matches!(result, Err(ComposeError::InvalidPort { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_compose("services: [unterminated");
        assert!(matches!(result, Err(ComposeError::Yaml(_))));
    }

    #[test]
    fn test_source_precedence() {
        let source = ComposeSource::from_attributes(Some("compose.yml"), Some("services: {}"));
        assert_eq!(
            source.unwrap(),
            ComposeSource::File(PathBuf::from("compose.yml"))
        );
        assert!(matches!(
            ComposeSource::from_attributes(None, None),
            Err(ComposeError::MissingSource)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compose.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let file = ComposeSource::File(path).load().unwrap();
        assert_eq!(file.services.len(), 2);

        let missing = ComposeSource::File(dir.path().join("nope.yml")).load();
        assert!(matches!(missing, Err(ComposeError::Read { .. })));
    }
}
