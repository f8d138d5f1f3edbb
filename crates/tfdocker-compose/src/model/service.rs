//! サービス定義

use super::port::PortMapping;
use super::volume::ServiceVolume;
use std::collections::BTreeMap;

/// `services` 配下の 1 サービス
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub image: Option<String>,
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub environment: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<ServiceVolume>,
    /// 参加するネットワーク。空なら `{project}_default`
    pub networks: Vec<String>,
    pub depends_on: Vec<String>,
    /// 再起動ポリシー (no, always, on-failure, unless-stopped)
    pub restart: Option<String>,
    pub hostname: Option<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub privileged: bool,
    pub labels: BTreeMap<String, String>,
}
