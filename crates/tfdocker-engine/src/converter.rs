//! Compose サービスから Docker API パラメータへの変換

use crate::error::{EngineError, Result};
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, NetworkingConfig,
    PortBinding, RestartPolicy, RestartPolicyNameEnum,
};
use std::collections::HashMap;
use tfdocker_compose::{ComposeFile, MountKind, ProjectNaming, Service};

/// 作成するコンテナ
#[derive(Debug, Clone)]
pub struct ContainerPlan {
    pub name: String,
    pub body: ContainerCreateBody,
}

/// `restart` 指定を RestartPolicy に変換
///
/// `no` / `always` / `unless-stopped` / `on-failure[:N]` を受け付ける。
pub fn restart_policy(restart: &str) -> Result<RestartPolicy> {
    let (name, retries) = match restart.split_once(':') {
        Some((name, count)) => {
            let count: i64 = count.parse().map_err(|_| {
                EngineError::InvalidConfig(format!("invalid restart policy: {}", restart))
            })?;
            (name, Some(count))
        }
        None => (restart, None),
    };

    let name = match name {
        "" | "no" => RestartPolicyNameEnum::NO,
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        _ => {
            return Err(EngineError::InvalidConfig(format!(
                "invalid restart policy: {}",
                restart
            )));
        }
    };

    if retries.is_some() && name != RestartPolicyNameEnum::ON_FAILURE {
        return Err(EngineError::InvalidConfig(format!(
            "retry count is only valid with on-failure: {}",
            restart
        )));
    }

    Ok(RestartPolicy {
        name: Some(name),
        maximum_retry_count: retries,
    })
}

/// サービスが接続するネットワーク名（プロジェクト接頭辞付き）
pub fn service_networks(project: &ProjectNaming, service: &Service) -> Vec<String> {
    if service.networks.is_empty() {
        vec![project.default_network()]
    } else {
        service
            .networks
            .iter()
            .map(|n| project.scoped_name(n))
            .collect()
    }
}

/// Compose のサービスをコンテナ設定に変換
pub fn service_to_container(
    project: &ProjectNaming,
    file: &ComposeFile,
    service_name: &str,
    service: &Service,
) -> Result<ContainerPlan> {
    let image = service.image.clone().ok_or_else(|| {
        EngineError::InvalidConfig(format!("service '{}' has no image", service_name))
    })?;

    // 環境変数の設定
    let env: Vec<String> = service
        .environment
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    // ポートバインディングの設定
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();

    for port in &service.ports {
        let container_port = port.port_key();
        exposed_ports.insert(container_port.clone(), HashMap::new());

        if let Some(published) = &port.published {
            port_bindings
                .entry(container_port)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: port.host_ip.clone(),
                    host_port: Some(published.clone()),
                });
        }
    }

    // マウント設定。ファイルで宣言された名前付きボリュームはプロジェクト接頭辞付き
    let mounts: Vec<Mount> = service
        .volumes
        .iter()
        .map(|v| {
            let (typ, source) = match v.kind {
                MountKind::Volume => {
                    let source = v.source.as_ref().map(|s| {
                        match file.volumes.get(s) {
                            Some(def) if !def.external => project.scoped_name(s),
                            _ => s.clone(),
                        }
                    });
                    (MountTypeEnum::VOLUME, source)
                }
                MountKind::Bind => (MountTypeEnum::BIND, v.source.clone()),
                MountKind::Tmpfs => (MountTypeEnum::TMPFS, None),
            };
            Mount {
                target: Some(v.target.clone()),
                source,
                typ: Some(typ),
                read_only: Some(v.read_only),
                ..Default::default()
            }
        })
        .collect();

    let restart_policy = service.restart.as_deref().map(restart_policy).transpose()?;

    let networks = service_networks(project, service);
    let endpoints: HashMap<String, EndpointSettings> = networks
        .iter()
        .map(|network| {
            (
                network.clone(),
                EndpointSettings {
                    aliases: Some(vec![service_name.to_string()]),
                    ..Default::default()
                },
            )
        })
        .collect();

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        mounts: Some(mounts),
        restart_policy,
        privileged: Some(service.privileged),
        network_mode: networks.first().cloned(),
        ..Default::default()
    };

    // サービス独自のラベルに Compose のラベルを重ねる
    let mut labels: HashMap<String, String> = service
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    labels.extend(project.service_labels(service_name));

    let body = ContainerCreateBody {
        image: Some(image),
        env: Some(env),
        cmd: service.command.clone(),
        entrypoint: service.entrypoint.clone(),
        exposed_ports: Some(exposed_ports),
        hostname: service.hostname.clone(),
        working_dir: service.working_dir.clone(),
        user: service.user.clone(),
        labels: Some(labels),
        host_config: Some(host_config),
        networking_config: Some(NetworkingConfig {
            endpoints_config: Some(endpoints),
        }),
        ..Default::default()
    };

    Ok(ContainerPlan {
        name: project.container_name(service_name),
        body,
    })
}
