//! docker_container: 単一コンテナ
//!
//! 設定の変更はすべて再作成になる。`remove` だけは削除時の挙動なので
//! その場で更新する。

use crate::ProviderData;
use crate::common::{HealthcheckModel, endpoint_addresses, healthcheck_block, to_hash_map};
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum,
    NetworkingConfig, PortBinding,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tfdocker_engine::converter::restart_policy;
use tfdocker_engine::{EngineError, OptionalExt, ignore_not_found};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, NestedBlock, Resource, Schema, Type, Value, async_trait,
    decode, encode,
};

/// 削除時の停止猶予（秒）
const STOP_TIMEOUT_SECS: i32 = 30;

pub struct ContainerResource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ContainerModel {
    id: Option<String>,
    container_id: Option<String>,
    name: String,
    image: String,
    command: Option<Vec<String>>,
    entrypoint: Option<Vec<String>>,
    env: Option<BTreeMap<String, String>>,
    labels: Option<BTreeMap<String, String>>,
    hostname: Option<String>,
    domainname: Option<String>,
    user: Option<String>,
    working_dir: Option<String>,
    restart: Option<String>,
    privileged: Option<bool>,
    tty: Option<bool>,
    stdin_open: Option<bool>,
    network_mode: Option<String>,
    dns: Option<Vec<String>>,
    dns_search: Option<Vec<String>>,
    extra_hosts: Option<Vec<String>>,
    memory: Option<i64>,
    memory_swap: Option<i64>,
    cpu_shares: Option<i64>,
    cpu_period: Option<i64>,
    cpu_quota: Option<i64>,
    remove: Option<bool>,
    must_run: Option<bool>,
    networks: Option<Vec<String>>,
    ports: Vec<PortModel>,
    volumes: Vec<VolumeMountModel>,
    healthcheck: Option<HealthcheckModel>,
    ip_address: Option<String>,
    gateway: Option<String>,
    exit_code: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PortModel {
    internal: i64,
    external: Option<i64>,
    ip: Option<String>,
    protocol: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct VolumeMountModel {
    volume_name: Option<String>,
    host_path: Option<String>,
    container_path: String,
    read_only: bool,
}

fn schema() -> Schema {
    let ports = Block::new()
        .attribute(
            Attribute::required("internal", Type::Number)
                .description("Port within the container.")
                .requires_replace(),
        )
        .attribute(
            Attribute::optional_number("external")
                .description("Port exposed out of the container.")
                .requires_replace(),
        )
        .attribute(
            Attribute::optional_string("ip")
                .description("IP address/mask that can access this port. Default is 0.0.0.0.")
                .with_default("0.0.0.0")
                .requires_replace(),
        )
        .attribute(
            Attribute::optional_string("protocol")
                .description("Protocol that can be used over this port. Default is tcp.")
                .with_default("tcp")
                .requires_replace(),
        );

    let volumes = Block::new()
        .attribute(
            Attribute::optional_string("volume_name")
                .description("The name of the docker volume to mount.")
                .requires_replace(),
        )
        .attribute(
            Attribute::optional_string("host_path")
                .description("The path on the host to mount.")
                .requires_replace(),
        )
        .attribute(
            Attribute::required_string("container_path")
                .description("The path in the container where the volume will be mounted.")
                .requires_replace(),
        )
        .attribute(
            Attribute::optional_bool("read_only")
                .description("If true, this volume will be readonly. Default is false.")
                .with_default(false)
                .requires_replace(),
        );

    let mut block = Block::new()
        .description("Manages the lifecycle of a Docker container.")
        .attribute(
            Attribute::computed_string("id")
                .description("The container ID.")
                .use_state_for_unknown(),
        )
        .attribute(
            Attribute::required_string("name")
                .description("The name of the container.")
                .requires_replace(),
        )
        .attribute(
            Attribute::required_string("image")
                .description("The image to use for the container.")
                .requires_replace(),
        );

    for (name, description) in [
        ("command", "The command to use to start the container."),
        ("entrypoint", "The command to use as the entrypoint."),
        ("dns", "DNS servers to use."),
        ("dns_search", "DNS search domains to use."),
        ("extra_hosts", "Additional hosts to add to /etc/hosts, as host:ip."),
    ] {
        block = block.attribute(
            Attribute::optional(name, Type::list(Type::String))
                .description(description)
                .requires_replace(),
        );
    }

    for (name, description) in [
        ("env", "Environment variables to set in the container."),
        ("labels", "User-defined key/value metadata."),
    ] {
        block = block.attribute(
            Attribute::optional(name, Type::map(Type::String))
                .description(description)
                .requires_replace(),
        );
    }

    for (name, description) in [
        ("hostname", "Hostname of the container."),
        ("domainname", "Domain name of the container."),
        ("user", "User used for running commands inside the container."),
        ("working_dir", "The working directory for commands to run in."),
        ("network_mode", "Network mode of the container."),
    ] {
        block = block.attribute(
            Attribute::optional_string(name)
                .description(description)
                .requires_replace(),
        );
    }

    block = block.attribute(
        Attribute::optional_string("restart")
            .description(
                "The restart policy for the container: no, on-failure[:N], always or unless-stopped. Default is no.",
            )
            .with_default("no")
            .requires_replace(),
    );

    for (name, description) in [
        ("privileged", "If true, the container runs in privileged mode. Default is false."),
        ("tty", "If true, allocate a pseudo-tty. Default is false."),
        ("stdin_open", "If true, keep STDIN open even if not attached. Default is false."),
    ] {
        block = block.attribute(
            Attribute::optional_bool(name)
                .description(description)
                .with_default(false)
                .requires_replace(),
        );
    }

    for (name, description) in [
        ("memory", "Memory limit in bytes. Default is 0 (unlimited)."),
        ("memory_swap", "Total memory limit (memory + swap) in bytes. Set to -1 for unlimited swap. Default is 0."),
        ("cpu_shares", "CPU shares (relative weight). Default is 0."),
        ("cpu_period", "CPU CFS period in microseconds. Default is 0."),
        ("cpu_quota", "CPU CFS quota in microseconds. Default is 0."),
    ] {
        block = block.attribute(
            Attribute::optional_number(name)
                .description(description)
                .with_default(0i64)
                .requires_replace(),
        );
    }

    block = block
        .attribute(
            Attribute::optional_bool("remove")
                .description("If true, the container is stopped and removed on destroy. Default is true.")
                .with_default(true),
        )
        .attribute(
            Attribute::optional_bool("must_run")
                .description("If true, the container is started after creation. Default is true.")
                .with_default(true)
                .requires_replace(),
        )
        .attribute(
            Attribute::optional("networks", Type::set(Type::String))
                .description("Networks to connect the container to.")
                .requires_replace(),
        )
        .attribute(Attribute::computed_string("container_id").description("The container ID."))
        .attribute(
            Attribute::computed_string("ip_address")
                .description("The IP address of the container."),
        )
        .attribute(
            Attribute::computed_string("gateway")
                .description("The network gateway of the container."),
        )
        .attribute(
            Attribute::computed_number("exit_code")
                .description("The exit code of the container if it has stopped."),
        )
        .block(NestedBlock::list("ports", ports))
        .block(NestedBlock::list("volumes", volumes))
        .block(healthcheck_block(true));

    Schema::new(block)
}

/// memory_swap は -1 が「無制限」なので 0 だけを未指定とみなす
fn non_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

fn positive(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

/// モデルをコンテナ作成リクエストに変換
fn container_body(model: &ContainerModel) -> Result<ContainerCreateBody, String> {
    let env: Option<Vec<String>> = model
        .env
        .as_ref()
        .map(|env| env.iter().map(|(k, v)| format!("{}={}", k, v)).collect());

    // ポート
    let mut exposed_ports = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &model.ports {
        let key = format!(
            "{}/{}",
            port.internal,
            port.protocol.as_deref().unwrap_or("tcp")
        );
        exposed_ports.insert(key.clone(), HashMap::new());

        let binding = PortBinding {
            host_ip: Some(port.ip.clone().unwrap_or_else(|| "0.0.0.0".to_string())),
            host_port: port
                .external
                .filter(|external| *external > 0)
                .map(|external| external.to_string()),
        };
        port_bindings
            .entry(key)
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(binding);
    }

    // ボリューム名があればボリューム、なければバインドマウント
    let mut mounts = Vec::new();
    for volume in &model.volumes {
        let mount = if let Some(name) = volume.volume_name.clone().filter(|n| !n.is_empty()) {
            Mount {
                typ: Some(MountTypeEnum::VOLUME),
                source: Some(name),
                ..Default::default()
            }
        } else if let Some(path) = volume.host_path.clone().filter(|p| !p.is_empty()) {
            Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(path),
                ..Default::default()
            }
        } else {
            return Err(format!(
                "volume mounted at {} needs either volume_name or host_path",
                volume.container_path
            ));
        };
        mounts.push(Mount {
            target: Some(volume.container_path.clone()),
            read_only: Some(volume.read_only),
            ..mount
        });
    }

    let restart = match model.restart.as_deref() {
        None | Some("") => None,
        Some(restart) => Some(restart_policy(restart).map_err(|e| e.to_string())?),
    };

    let healthcheck = model
        .healthcheck
        .as_ref()
        .map(HealthcheckModel::to_config)
        .transpose()?;

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        mounts: (!mounts.is_empty()).then_some(mounts),
        restart_policy: restart,
        privileged: model.privileged,
        network_mode: model.network_mode.clone().filter(|m| !m.is_empty()),
        dns: model.dns.clone(),
        dns_search: model.dns_search.clone(),
        extra_hosts: model.extra_hosts.clone(),
        memory: positive(model.memory),
        memory_swap: non_zero(model.memory_swap),
        cpu_shares: positive(model.cpu_shares),
        cpu_period: positive(model.cpu_period),
        cpu_quota: positive(model.cpu_quota),
        ..Default::default()
    };

    let networking_config = model.networks.as_ref().filter(|n| !n.is_empty()).map(|networks| {
        NetworkingConfig {
            endpoints_config: Some(
                networks
                    .iter()
                    .map(|n| (n.clone(), EndpointSettings::default()))
                    .collect(),
            ),
        }
    });

    Ok(ContainerCreateBody {
        image: Some(model.image.clone()),
        cmd: model.command.clone(),
        entrypoint: model.entrypoint.clone(),
        env,
        labels: to_hash_map(&model.labels),
        hostname: model.hostname.clone().filter(|h| !h.is_empty()),
        domainname: model.domainname.clone().filter(|d| !d.is_empty()),
        user: model.user.clone().filter(|u| !u.is_empty()),
        working_dir: model.working_dir.clone().filter(|w| !w.is_empty()),
        tty: model.tty,
        open_stdin: model.stdin_open,
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        healthcheck,
        host_config: Some(host_config),
        networking_config,
        ..Default::default()
    })
}

/// inspect の結果を反映。存在しなければ false
async fn refresh(data: &ProviderData, model: &mut ContainerModel, id: &str) -> Result<bool, EngineError> {
    let Some(container) = data
        .docker
        .inspect_container(id, None::<bollard::query_parameters::InspectContainerOptions>)
        .await
        .map_err(EngineError::from)
        .optional()?
    else {
        return Ok(false);
    };

    if let Some(id) = container.id.clone() {
        model.id = Some(id.clone());
        model.container_id = Some(id);
    }
    if let Some(name) = container.name.as_deref() {
        model.name = name.trim_start_matches('/').to_string();
    }
    if let Some(image) = container.config.as_ref().and_then(|c| c.image.clone()) {
        model.image = image;
    }
    let (ip_address, gateway) = endpoint_addresses(container.network_settings.as_ref());
    model.ip_address = ip_address;
    model.gateway = gateway;
    model.exit_code = container.state.as_ref().and_then(|s| s.exit_code);
    Ok(true)
}

#[async_trait]
impl Resource<ProviderData> for ContainerResource {
    fn type_name(&self) -> &'static str {
        "docker_container"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        if !config.is_wholly_known() {
            return;
        }
        let Some(model) = decode::<ContainerModel>(config, diags) else {
            return;
        };
        if let Err(e) = container_body(&model) {
            diags.error("Invalid Container Configuration", e);
        }
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ContainerModel = decode(plan, diags)?;

        let body = match container_body(&model) {
            Ok(body) => body,
            Err(e) => {
                diags.error("Invalid Container Configuration", e);
                return None;
            }
        };

        tracing::debug!("Creating Docker container {}", model.name);
        let created = match data
            .docker
            .create_container(
                Some(
                    bollard::query_parameters::CreateContainerOptionsBuilder::new()
                        .name(&model.name)
                        .build(),
                ),
                body,
            )
            .await
        {
            Ok(created) => created,
            Err(e) => {
                diags.error(
                    "Container Create Error",
                    format!("Unable to create container {}: {}", model.name, e),
                );
                return None;
            }
        };
        for warning in &created.warnings {
            tracing::warn!("Docker warning for container {}: {}", model.name, warning);
        }
        model.id = Some(created.id.clone());
        model.container_id = Some(created.id.clone());

        if model.must_run.unwrap_or(true) {
            if let Err(e) = data
                .docker
                .start_container(
                    &created.id,
                    None::<bollard::query_parameters::StartContainerOptions>,
                )
                .await
            {
                diags.error(
                    "Container Start Error",
                    format!("Unable to start container {}: {}", model.name, e),
                );
                return None;
            }
        }

        if let Err(e) = refresh(data, &mut model, &created.id).await {
            diags.error(
                "Container Read Error",
                format!("Unable to inspect container {}: {}", model.name, e),
            );
            return None;
        }

        tracing::debug!("Created Docker container {} ({})", model.name, created.id);
        encode(&model, &schema(), diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ContainerModel = decode(state, diags)?;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        match refresh(data, &mut model, &id).await {
            Ok(true) => encode(&model, &schema(), diags),
            Ok(false) => {
                tracing::debug!("Container {} is gone, removing from state", id);
                None
            }
            Err(e) => {
                diags.error(
                    "Container Read Error",
                    format!("Unable to read container {}: {}", id, e),
                );
                None
            }
        }
    }

    async fn update(
        &self,
        _data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        // 置き換えを伴わない変更は remove のみ
        let mut model: ContainerModel = decode(plan, diags)?;
        let prior: ContainerModel = decode(prior, diags)?;
        model.id = prior.id;
        model.container_id = prior.container_id;
        model.ip_address = prior.ip_address;
        model.gateway = prior.gateway;
        model.exit_code = prior.exit_code;
        encode(&model, &schema(), diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<ContainerModel>(state, diags) else {
            return;
        };
        if !model.remove.unwrap_or(true) {
            tracing::debug!("Leaving container {} in place as configured", model.name);
            return;
        }
        let id = model.id.unwrap_or(model.name);

        tracing::debug!("Stopping Docker container {}", id);
        match data
            .docker
            .stop_container(
                &id,
                Some(bollard::query_parameters::StopContainerOptions {
                    t: Some(STOP_TIMEOUT_SECS),
                    signal: None,
                }),
            )
            .await
            .map_err(EngineError::from)
        {
            Ok(()) | Err(EngineError::NotModified) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                diags.error(
                    "Container Stop Error",
                    format!("Unable to stop container {}: {}", id, e),
                );
                return;
            }
        }

        let removed = data
            .docker
            .remove_container(
                &id,
                Some(bollard::query_parameters::RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(EngineError::from);
        match ignore_not_found(removed) {
            Ok(()) => tracing::debug!("Deleted Docker container {}", id),
            Err(e) => diags.error(
                "Container Delete Error",
                format!("Unable to remove container {}: {}", id, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = ContainerModel {
            id: Some(id.to_string()),
            ..Default::default()
        };
        encode(&model, &schema(), diags)
    }
}
