//! docker_service: Swarm サービス
//!
//! `converge_config` があるときは作成・更新後に UpdateStatus が終端状態に
//! なるまで待つ。タイムアウトはエラーではなく警告にする。

use crate::ProviderData;
use crate::common::{
    HealthcheckModel, RegistryAuthModel, duration_nanos, from_hash_map, healthcheck_block,
    non_empty, resolve_registry_credentials, to_hash_map,
};
use bollard::models::{
    EndpointPortConfig, EndpointSpec, Limit, Mount, NetworkAttachmentConfig, ResourceObject,
    ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated, ServiceSpecRollbackConfig,
    ServiceSpecUpdateConfig, TaskSpec, TaskSpecContainerSpec, TaskSpecContainerSpecConfigs,
    TaskSpecContainerSpecDnsConfig, TaskSpecContainerSpecSecrets, TaskSpecLogDriver,
    TaskSpecPlacement, TaskSpecResources, TaskSpecRestartPolicy,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfdocker_engine::{
    ConvergeConfig, Convergence, EngineError, OptionalExt, ignore_not_found, parse_duration,
    wait_for_convergence,
};
use tfdocker_plugin::{
    Attribute, Block, Diagnostics, NestedBlock, Resource, Schema, Type, Value, async_trait,
    decode,
};

/// シークレット・コンフィグのファイルモード既定値（0444）
const DEFAULT_FILE_MODE: i64 = 0o444;

pub struct ServiceResource;

// ============ モデル ============

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ServiceModel {
    id: Option<String>,
    name: String,
    labels: Option<BTreeMap<String, String>>,
    mode: Option<String>,
    replicas: Option<i64>,
    task_spec: Option<TaskSpecModel>,
    endpoint_spec: Option<EndpointSpecModel>,
    update_config: Option<UpdateConfigModel>,
    rollback_config: Option<UpdateConfigModel>,
    converge_config: Option<ConvergeConfigModel>,
    auth: Option<ServiceAuthModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TaskSpecModel {
    container_spec: Option<ContainerSpecModel>,
    resources: Option<ResourcesModel>,
    restart_policy: Option<RestartPolicyModel>,
    placement: Option<PlacementModel>,
    networks: Option<Vec<String>>,
    log_driver: Option<LogDriverModel>,
    force_update: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ContainerSpecModel {
    image: String,
    command: Option<Vec<String>>,
    args: Option<Vec<String>>,
    hostname: Option<String>,
    env: Option<BTreeMap<String, String>>,
    dir: Option<String>,
    user: Option<String>,
    groups: Option<Vec<String>>,
    read_only: Option<bool>,
    stop_signal: Option<String>,
    stop_grace_period: Option<String>,
    labels: Option<BTreeMap<String, String>>,
    mounts: Vec<MountModel>,
    hosts: Vec<HostModel>,
    healthcheck: Option<HealthcheckModel>,
    dns_config: Option<DnsConfigModel>,
    secrets: Vec<FileReferenceModel>,
    configs: Vec<FileReferenceModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MountModel {
    target: String,
    source: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    read_only: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct HostModel {
    host: String,
    ip: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DnsConfigModel {
    nameservers: Option<Vec<String>>,
    search: Option<Vec<String>>,
    options: Option<Vec<String>>,
}

/// secrets / configs ブロック。`secret_*` と `config_*` を同じ形で受ける
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FileReferenceModel {
    #[serde(alias = "secret_id", alias = "config_id", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(alias = "secret_name", alias = "config_name", skip_serializing_if = "Option::is_none")]
    ref_name: Option<String>,
    file_name: String,
    file_uid: Option<String>,
    file_gid: Option<String>,
    file_mode: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ResourcesModel {
    limits: Option<ResourceLimitsModel>,
    reservations: Option<ResourceLimitsModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ResourceLimitsModel {
    nano_cpus: Option<i64>,
    memory_bytes: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RestartPolicyModel {
    condition: Option<String>,
    delay: Option<String>,
    max_attempts: Option<i64>,
    window: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PlacementModel {
    constraints: Option<Vec<String>>,
    max_replicas: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LogDriverModel {
    name: String,
    options: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct EndpointSpecModel {
    mode: Option<String>,
    ports: Vec<PortConfigModel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PortConfigModel {
    name: Option<String>,
    protocol: Option<String>,
    target_port: i64,
    published_port: Option<i64>,
    publish_mode: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct UpdateConfigModel {
    parallelism: Option<i64>,
    delay: Option<String>,
    failure_action: Option<String>,
    monitor: Option<String>,
    max_failure_ratio: Option<f64>,
    order: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConvergeConfigModel {
    delay: Option<String>,
    timeout: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ServiceAuthModel {
    server_address: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

// secrets / configs は state 上で属性名が異なるため、書き出し時に付け替える
impl ServiceModel {
    fn to_state(&self) -> serde_json::Result<serde_json::Value> {
        let mut json = serde_json::to_value(self)?;
        if let Some(spec) = json
            .pointer_mut("/task_spec/container_spec")
            .and_then(|v| v.as_object_mut())
        {
            for (block, prefix) in [("secrets", "secret"), ("configs", "config")] {
                if let Some(items) = spec.get_mut(block).and_then(|v| v.as_array_mut()) {
                    for item in items.iter_mut().filter_map(|i| i.as_object_mut()) {
                        if let Some(id) = item.remove("id") {
                            item.insert(format!("{}_id", prefix), id);
                        }
                        if let Some(name) = item.remove("ref_name") {
                            item.insert(format!("{}_name", prefix), name);
                        }
                    }
                }
            }
        }
        Ok(json)
    }
}

// ============ スキーマ ============

fn update_config_block(name: &str, description: &str) -> NestedBlock {
    NestedBlock::single(
        name,
        Block::new()
            .description(description)
            .attribute(
                Attribute::optional_number("parallelism")
                    .description("Maximum number of tasks updated simultaneously. Default is 1.")
                    .with_default(1i64),
            )
            .attribute(
                Attribute::optional_string("delay")
                    .description("Delay between task updates. Default is 0s.")
                    .with_default("0s"),
            )
            .attribute(
                Attribute::optional_string("failure_action")
                    .description("Action on failure: pause, continue or rollback. Default is pause.")
                    .with_default("pause"),
            )
            .attribute(
                Attribute::optional_string("monitor")
                    .description("Duration to monitor each task for failure. Default is 5s.")
                    .with_default("5s"),
            )
            .attribute(
                Attribute::optional_number("max_failure_ratio")
                    .description("Failure rate to tolerate during an update."),
            )
            .attribute(
                Attribute::optional_string("order")
                    .description("Operation order: stop-first or start-first. Default is stop-first.")
                    .with_default("stop-first"),
            ),
    )
}

fn file_reference_block(kind: &str) -> NestedBlock {
    NestedBlock::list(
        &format!("{}s", kind),
        Block::new()
            .description(&format!("References to {}s exposed to the service.", kind))
            .attribute(
                Attribute::required_string(&format!("{}_id", kind))
                    .description(&format!("The {} ID.", kind)),
            )
            .attribute(
                Attribute::required_string(&format!("{}_name", kind))
                    .description(&format!("The {} name.", kind)),
            )
            .attribute(
                Attribute::required_string("file_name")
                    .description("Target file name inside the container."),
            )
            .attribute(
                Attribute::optional_string("file_uid")
                    .description("File UID. Default is 0.")
                    .with_default("0"),
            )
            .attribute(
                Attribute::optional_string("file_gid")
                    .description("File GID. Default is 0.")
                    .with_default("0"),
            )
            .attribute(
                Attribute::optional_number("file_mode")
                    .description("File mode. Default is 0444.")
                    .with_default(DEFAULT_FILE_MODE),
            ),
    )
}

fn resource_limits_block(name: &str) -> NestedBlock {
    NestedBlock::single(
        name,
        Block::new()
            .attribute(Attribute::optional_number("nano_cpus").description("CPU quota in units of 1e-9 CPUs."))
            .attribute(Attribute::optional_number("memory_bytes").description("Memory in bytes.")),
    )
}

fn container_spec_block() -> NestedBlock {
    let mut block = Block::new()
        .description("The container specification of the service tasks.")
        .attribute(Attribute::required_string("image").description("The image used to create the containers."));

    for (name, description) in [
        ("command", "The command to run in the image."),
        ("args", "Arguments to the command."),
        ("groups", "Additional groups the container process runs as."),
    ] {
        block = block.attribute(Attribute::optional(name, Type::list(Type::String)).description(description));
    }
    for (name, description) in [
        ("hostname", "Hostname of the containers."),
        ("dir", "Working directory for commands to run in."),
        ("user", "User inside the containers."),
        ("stop_signal", "Signal to stop the containers."),
        ("stop_grace_period", "Time to wait before forcefully killing the containers."),
    ] {
        block = block.attribute(Attribute::optional_string(name).description(description));
    }

    block = block
        .attribute(Attribute::optional("env", Type::map(Type::String)).description("Environment variables."))
        .attribute(Attribute::optional("labels", Type::map(Type::String)).description("Container labels."))
        .attribute(
            Attribute::optional_bool("read_only")
                .description("Mount the root filesystem read-only. Default is false.")
                .with_default(false),
        )
        .block(NestedBlock::list(
            "mounts",
            Block::new()
                .attribute(Attribute::required_string("target").description("Container path."))
                .attribute(Attribute::optional_string("source").description("Mount source (volume name or host path)."))
                .attribute(Attribute::required_string("type").description("Mount type: bind, volume or tmpfs."))
                .attribute(
                    Attribute::optional_bool("read_only")
                        .description("Whether the mount is read-only. Default is false.")
                        .with_default(false),
                ),
        ))
        .block(NestedBlock::list(
            "hosts",
            Block::new()
                .attribute(Attribute::required_string("host").description("Hostname."))
                .attribute(Attribute::required_string("ip").description("IP address.")),
        ))
        .block(healthcheck_block(false))
        .block(NestedBlock::single(
            "dns_config",
            Block::new()
                .attribute(Attribute::optional("nameservers", Type::list(Type::String)).description("DNS servers."))
                .attribute(Attribute::optional("search", Type::list(Type::String)).description("Search domains."))
                .attribute(Attribute::optional("options", Type::list(Type::String)).description("Resolver options.")),
        ))
        .block(file_reference_block("secret"))
        .block(file_reference_block("config"));

    NestedBlock::single("container_spec", block).min_items(1)
}

fn task_spec_block() -> NestedBlock {
    NestedBlock::single(
        "task_spec",
        Block::new()
            .description("User modifiable task configuration.")
            .attribute(
                Attribute::optional("networks", Type::set(Type::String))
                    .description("Networks the tasks attach to."),
            )
            .attribute(
                Attribute::optional_number("force_update")
                    .description("Counter that triggers an update even without changes. Default is 0.")
                    .with_default(0i64),
            )
            .block(container_spec_block())
            .block(NestedBlock::single(
                "resources",
                Block::new()
                    .block(resource_limits_block("limits"))
                    .block(resource_limits_block("reservations")),
            ))
            .block(NestedBlock::single(
                "restart_policy",
                Block::new()
                    .attribute(
                        Attribute::optional_string("condition")
                            .description("Condition for restart: none, on-failure or any. Default is any.")
                            .with_default("any"),
                    )
                    .attribute(
                        Attribute::optional_string("delay")
                            .description("Delay between restart attempts. Default is 5s.")
                            .with_default("5s"),
                    )
                    .attribute(Attribute::optional_number("max_attempts").description("Maximum restart attempts."))
                    .attribute(Attribute::optional_string("window").description("Window used to evaluate the restart policy.")),
            ))
            .block(NestedBlock::single(
                "placement",
                Block::new()
                    .attribute(
                        Attribute::optional("constraints", Type::set(Type::String))
                            .description("Placement constraints."),
                    )
                    .attribute(Attribute::optional_number("max_replicas").description("Maximum replicas per node.")),
            ))
            .block(NestedBlock::single(
                "log_driver",
                Block::new()
                    .attribute(Attribute::required_string("name").description("The logging driver."))
                    .attribute(Attribute::optional("options", Type::map(Type::String)).description("Driver options.")),
            )),
    )
    .min_items(1)
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Manages a Docker Swarm service.")
            .attribute(
                Attribute::computed_string("id")
                    .description("The service ID.")
                    .use_state_for_unknown(),
            )
            .attribute(
                Attribute::required_string("name")
                    .description("The name of the service.")
                    .requires_replace(),
            )
            .attribute(Attribute::optional("labels", Type::map(Type::String)).description("Service labels."))
            .attribute(
                Attribute::optional_string("mode")
                    .description("Service mode: replicated or global. Default is replicated.")
                    .with_default("replicated"),
            )
            .attribute(
                Attribute::optional_number("replicas")
                    .description("Number of replicas in replicated mode. Default is 1.")
                    .with_default(1i64),
            )
            .block(task_spec_block())
            .block(NestedBlock::single(
                "endpoint_spec",
                Block::new()
                    .attribute(
                        Attribute::optional_string("mode")
                            .description("Resolution mode: vip or dnsrr. Default is vip.")
                            .with_default("vip"),
                    )
                    .block(NestedBlock::list(
                        "ports",
                        Block::new()
                            .attribute(Attribute::optional_string("name").description("Port name."))
                            .attribute(
                                Attribute::optional_string("protocol")
                                    .description("Protocol: tcp, udp or sctp. Default is tcp.")
                                    .with_default("tcp"),
                            )
                            .attribute(Attribute::required("target_port", Type::Number).description("Port inside the container."))
                            .attribute(Attribute::optional_number("published_port").description("Port on the swarm hosts."))
                            .attribute(
                                Attribute::optional_string("publish_mode")
                                    .description("Publish mode: ingress or host. Default is ingress.")
                                    .with_default("ingress"),
                            ),
                    )),
            ))
            .block(update_config_block("update_config", "Rolling update configuration."))
            .block(update_config_block("rollback_config", "Rollback configuration."))
            .block(NestedBlock::single(
                "converge_config",
                Block::new()
                    .description("Wait for the service to converge after create and update.")
                    .attribute(
                        Attribute::optional_string("delay")
                            .description("Delay between convergence checks. Default is 7s.")
                            .with_default("7s"),
                    )
                    .attribute(
                        Attribute::optional_string("timeout")
                            .description("Timeout for convergence. Default is 3m.")
                            .with_default("3m"),
                    ),
            ))
            .block(NestedBlock::single(
                "auth",
                Block::new()
                    .description("Registry authentication for private images.")
                    .attribute(Attribute::required_string("server_address").description("Registry server address."))
                    .attribute(Attribute::required_string("username").description("Registry username."))
                    .attribute(
                        Attribute::required_string("password")
                            .description("Registry password.")
                            .sensitive(),
                    ),
            )),
    )
}

// ============ ServiceSpec への変換 ============

/// Docker API の列挙値を文字列から読む
fn parse_enum<T: DeserializeOwned>(field: &str, value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("{}: unsupported value '{}'", field, value))
}

fn optional_enum<T: DeserializeOwned>(field: &str, value: &Option<String>) -> Result<Option<T>, String> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(v) => parse_enum(field, v).map(Some),
    }
}

fn container_spec(cs: &ContainerSpecModel) -> Result<TaskSpecContainerSpec, String> {
    let mounts = cs
        .mounts
        .iter()
        .map(|m| {
            Ok(Mount {
                target: Some(m.target.clone()),
                source: non_empty(m.source.clone()),
                typ: Some(parse_enum("mounts.type", &m.kind)?),
                read_only: m.read_only,
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let secrets = cs
        .secrets
        .iter()
        .map(|s| {
            let mut reference = TaskSpecContainerSpecSecrets {
                secret_id: s.id.clone(),
                secret_name: s.ref_name.clone(),
                ..Default::default()
            };
            let file = reference.file.get_or_insert_with(Default::default);
            file.name = Some(s.file_name.clone());
            file.uid = Some(s.file_uid.clone().unwrap_or_else(|| "0".to_string()));
            file.gid = Some(s.file_gid.clone().unwrap_or_else(|| "0".to_string()));
            file.mode = Some(s.file_mode.unwrap_or(DEFAULT_FILE_MODE) as u32);
            reference
        })
        .collect::<Vec<_>>();

    let configs = cs
        .configs
        .iter()
        .map(|c| {
            let mut reference = TaskSpecContainerSpecConfigs {
                config_id: c.id.clone(),
                config_name: c.ref_name.clone(),
                ..Default::default()
            };
            let file = reference.file.get_or_insert_with(Default::default);
            file.name = Some(c.file_name.clone());
            file.uid = Some(c.file_uid.clone().unwrap_or_else(|| "0".to_string()));
            file.gid = Some(c.file_gid.clone().unwrap_or_else(|| "0".to_string()));
            file.mode = Some(c.file_mode.unwrap_or(DEFAULT_FILE_MODE) as u32);
            reference
        })
        .collect::<Vec<_>>();

    Ok(TaskSpecContainerSpec {
        image: Some(cs.image.clone()),
        command: cs.command.clone(),
        args: cs.args.clone(),
        hostname: non_empty(cs.hostname.clone()),
        env: cs
            .env
            .as_ref()
            .map(|env| env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()),
        dir: non_empty(cs.dir.clone()),
        user: non_empty(cs.user.clone()),
        groups: cs.groups.clone(),
        read_only: cs.read_only,
        stop_signal: non_empty(cs.stop_signal.clone()),
        stop_grace_period: duration_nanos("stop_grace_period", &cs.stop_grace_period)?,
        labels: to_hash_map(&cs.labels),
        mounts: (!mounts.is_empty()).then_some(mounts),
        // /etc/hosts 形式: "IP ホスト名"
        hosts: (!cs.hosts.is_empty())
            .then(|| cs.hosts.iter().map(|h| format!("{} {}", h.ip, h.host)).collect()),
        health_check: cs
            .healthcheck
            .as_ref()
            .map(HealthcheckModel::to_config)
            .transpose()?,
        dns_config: cs.dns_config.as_ref().map(|dns| TaskSpecContainerSpecDnsConfig {
            nameservers: dns.nameservers.clone(),
            search: dns.search.clone(),
            options: dns.options.clone(),
        }),
        secrets: (!secrets.is_empty()).then_some(secrets),
        configs: (!configs.is_empty()).then_some(configs),
        ..Default::default()
    })
}

fn task_spec(task: &TaskSpecModel) -> Result<TaskSpec, String> {
    let restart_policy = match &task.restart_policy {
        Some(rp) => Some(TaskSpecRestartPolicy {
            condition: optional_enum("restart_policy.condition", &rp.condition)?,
            delay: duration_nanos("restart_policy.delay", &rp.delay)?,
            max_attempts: rp.max_attempts,
            window: duration_nanos("restart_policy.window", &rp.window)?,
        }),
        None => None,
    };

    let limits = |l: &ResourceLimitsModel| Limit {
        nano_cpus: l.nano_cpus,
        memory_bytes: l.memory_bytes,
        ..Default::default()
    };
    let reservations = |l: &ResourceLimitsModel| ResourceObject {
        nano_cpus: l.nano_cpus,
        memory_bytes: l.memory_bytes,
        ..Default::default()
    };

    Ok(TaskSpec {
        container_spec: task.container_spec.as_ref().map(container_spec).transpose()?,
        resources: task.resources.as_ref().map(|r| TaskSpecResources {
            limits: r.limits.as_ref().map(limits),
            reservations: r.reservations.as_ref().map(reservations),
            ..Default::default()
        }),
        restart_policy,
        placement: task.placement.as_ref().map(|p| TaskSpecPlacement {
            constraints: p.constraints.clone(),
            max_replicas: p.max_replicas,
            ..Default::default()
        }),
        networks: task.networks.as_ref().map(|networks| {
            networks
                .iter()
                .map(|target| NetworkAttachmentConfig {
                    target: Some(target.clone()),
                    ..Default::default()
                })
                .collect()
        }),
        log_driver: task.log_driver.as_ref().map(|ld| TaskSpecLogDriver {
            name: Some(ld.name.clone()),
            options: to_hash_map(&ld.options),
        }),
        force_update: task
            .force_update
            .map(|counter| {
                u64::try_from(counter).map_err(|_| {
                    format!("task_spec.force_update must not be negative, got {}", counter)
                })
            })
            .transpose()?,
        ..Default::default()
    })
}

fn update_config(prefix: &str, uc: &UpdateConfigModel) -> Result<ServiceSpecUpdateConfig, String> {
    Ok(ServiceSpecUpdateConfig {
        parallelism: uc.parallelism,
        delay: duration_nanos(&format!("{}.delay", prefix), &uc.delay)?,
        failure_action: optional_enum(&format!("{}.failure_action", prefix), &uc.failure_action)?,
        monitor: duration_nanos(&format!("{}.monitor", prefix), &uc.monitor)?,
        max_failure_ratio: uc.max_failure_ratio,
        order: optional_enum(&format!("{}.order", prefix), &uc.order)?,
    })
}

fn rollback_config(uc: &UpdateConfigModel) -> Result<ServiceSpecRollbackConfig, String> {
    Ok(ServiceSpecRollbackConfig {
        parallelism: uc.parallelism,
        delay: duration_nanos("rollback_config.delay", &uc.delay)?,
        failure_action: optional_enum("rollback_config.failure_action", &uc.failure_action)?,
        monitor: duration_nanos("rollback_config.monitor", &uc.monitor)?,
        max_failure_ratio: uc.max_failure_ratio,
        order: optional_enum("rollback_config.order", &uc.order)?,
    })
}

/// モデルを ServiceSpec に変換
fn service_spec(model: &ServiceModel) -> Result<ServiceSpec, String> {
    let mode = match model.mode.as_deref() {
        Some("global") => ServiceSpecMode {
            global: Some(Default::default()),
            ..Default::default()
        },
        None | Some("") | Some("replicated") => ServiceSpecMode {
            replicated: Some(ServiceSpecModeReplicated {
                replicas: Some(model.replicas.unwrap_or(1)),
            }),
            ..Default::default()
        },
        Some(other) => return Err(format!("mode: unsupported value '{}'", other)),
    };

    let endpoint_spec = match &model.endpoint_spec {
        Some(es) => {
            let ports = es
                .ports
                .iter()
                .map(|p| {
                    Ok(EndpointPortConfig {
                        name: non_empty(p.name.clone()),
                        protocol: optional_enum("endpoint_spec.ports.protocol", &p.protocol)?,
                        target_port: Some(p.target_port),
                        published_port: p.published_port.filter(|port| *port > 0),
                        publish_mode: optional_enum("endpoint_spec.ports.publish_mode", &p.publish_mode)?,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            Some(EndpointSpec {
                mode: optional_enum("endpoint_spec.mode", &es.mode)?,
                ports: (!ports.is_empty()).then_some(ports),
            })
        }
        None => None,
    };

    Ok(ServiceSpec {
        name: Some(model.name.clone()),
        labels: to_hash_map(&model.labels),
        task_template: model.task_spec.as_ref().map(task_spec).transpose()?,
        mode: Some(mode),
        update_config: model
            .update_config
            .as_ref()
            .map(|uc| update_config("update_config", uc))
            .transpose()?,
        rollback_config: model.rollback_config.as_ref().map(rollback_config).transpose()?,
        endpoint_spec,
        ..Default::default()
    })
}

/// Engine API の `version` クエリは i32 で送るため、収まらない値は診断にする
fn update_version(index: u64, diags: &mut Diagnostics) -> Option<i32> {
    match i32::try_from(index) {
        Ok(version) => Some(version),
        Err(_) => {
            diags.error(
                "Docker Service Update Failed",
                format!(
                    "Service version {} exceeds the range accepted by the update API",
                    index
                ),
            );
            None
        }
    }
}

fn converge_config(cc: &ConvergeConfigModel) -> Result<ConvergeConfig, String> {
    let defaults = ConvergeConfig::default();
    let parse = |field: &str, value: &Option<String>, default| match value.as_deref() {
        None | Some("") => Ok(default),
        Some(v) => parse_duration(v).map_err(|e| format!("converge_config.{}: {}", field, e)),
    };
    Ok(ConvergeConfig {
        delay: parse("delay", &cc.delay, defaults.delay)?,
        timeout: parse("timeout", &cc.timeout, defaults.timeout)?,
    })
}

// ============ リソース ============

/// `auth` ブロック、なければ Docker の config.json からイメージの認証情報を解決
fn credentials(
    model: &ServiceModel,
    diags: &mut Diagnostics,
) -> Option<Option<bollard::auth::DockerCredentials>> {
    let image = model
        .task_spec
        .as_ref()
        .and_then(|t| t.container_spec.as_ref())
        .map(|c| c.image.clone())
        .unwrap_or_default();
    let auth = model.auth.as_ref().map(|a| RegistryAuthModel {
        address: a.server_address.clone(),
        username: a.username.clone(),
        password: a.password.clone(),
    });
    resolve_registry_credentials(&image, auth.as_ref(), diags)
}

/// 収束待機。一時停止とタイムアウトは警告にする
async fn converge(data: &ProviderData, model: &ServiceModel, id: &str, diags: &mut Diagnostics) {
    let Some(cc) = &model.converge_config else {
        return;
    };
    let config = match converge_config(cc) {
        Ok(config) => config,
        Err(e) => {
            diags.error("Invalid Converge Configuration", e);
            return;
        }
    };

    match wait_for_convergence(&data.docker, id, &config).await {
        Ok(Convergence::Converged) => tracing::debug!("Service {} converged", id),
        Ok(Convergence::Paused(message)) => diags.warning(
            "Service Update Paused",
            format!("Service {} update is paused: {}", id, message),
        ),
        Ok(Convergence::TimedOut) => diags.warning(
            "Service Convergence Timeout",
            format!(
                "Service {} did not converge within {:?}",
                id, config.timeout
            ),
        ),
        Err(e) => diags.warning(
            "Service Convergence Timeout",
            format!("Unable to wait for service {}: {}", id, e),
        ),
    }
}

fn encode_model(model: &ServiceModel, diags: &mut Diagnostics) -> Option<Value> {
    let json = diags.ok(model.to_state(), "Value Conversion Error")?;
    diags.ok(schema().block.value_from_json(&json), "Value Conversion Error")
}

#[async_trait]
impl Resource<ProviderData> for ServiceResource {
    fn type_name(&self) -> &'static str {
        "docker_service"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        if !config.is_wholly_known() {
            return;
        }
        let Some(model) = decode::<ServiceModel>(config, diags) else {
            return;
        };
        if let Err(e) = service_spec(&model) {
            diags.error("Invalid Service Configuration", e);
        }
        if let Some(Err(e)) = model.converge_config.as_ref().map(converge_config) {
            diags.error("Invalid Converge Configuration", e);
        }
    }

    async fn create(&self, data: &ProviderData, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ServiceModel = decode(plan, diags)?;
        let spec = match service_spec(&model) {
            Ok(spec) => spec,
            Err(e) => {
                diags.error("Failed to build service spec", e);
                return None;
            }
        };
        let credentials = credentials(&model, diags)?;

        tracing::debug!("Creating Docker service {}", model.name);
        let id = match data.docker.create_service(spec, credentials).await {
            Ok(response) => response.id.unwrap_or_default(),
            Err(e) => {
                diags.error(
                    "Docker Service Creation Failed",
                    format!(
                        "Failed to create service {}: {}. Note: Docker must be in Swarm mode.",
                        model.name, e
                    ),
                );
                return None;
            }
        };
        model.id = Some(id.clone());

        converge(data, &model, &id, diags).await;

        tracing::debug!("Created Docker service {} ({})", model.name, id);
        encode_model(&model, diags)
    }

    async fn read(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: ServiceModel = decode(state, diags)?;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        let service = match data
            .docker
            .inspect_service(&id, None::<bollard::query_parameters::InspectServiceOptions>)
            .await
            .map_err(EngineError::from)
            .optional()
        {
            Ok(Some(service)) => service,
            Ok(None) => {
                tracing::debug!("Service {} not found, removing from state", id);
                return None;
            }
            Err(e) => {
                diags.error(
                    "Docker Service Read Failed",
                    format!("Failed to read service {}: {}", id, e),
                );
                return None;
            }
        };

        model.id = service.id.or(model.id);
        if let Some(spec) = service.spec {
            if let Some(name) = spec.name {
                model.name = name;
            }
            if let Some(labels) = from_hash_map(spec.labels) {
                model.labels = Some(labels);
            }
            match spec.mode {
                Some(mode) if mode.global.is_some() => {
                    model.mode = Some("global".to_string());
                }
                Some(mode) => {
                    model.mode = Some("replicated".to_string());
                    if let Some(replicas) = mode.replicated.and_then(|r| r.replicas) {
                        model.replicas = Some(replicas);
                    }
                }
                None => {}
            }
        }
        encode_model(&model, diags)
    }

    async fn update(
        &self,
        data: &ProviderData,
        prior: &Value,
        plan: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        let mut model: ServiceModel = decode(plan, diags)?;
        let prior: ServiceModel = decode(prior, diags)?;
        model.id = prior.id;
        let id = model.id.clone().unwrap_or_else(|| model.name.clone());

        let version = match data
            .docker
            .inspect_service(&id, None::<bollard::query_parameters::InspectServiceOptions>)
            .await
        {
            Ok(service) => service.version.and_then(|v| v.index).unwrap_or_default(),
            Err(e) => {
                diags.error(
                    "Docker Service Update Failed",
                    format!("Failed to inspect service {}: {}", id, e),
                );
                return None;
            }
        };

        let spec = match service_spec(&model) {
            Ok(spec) => spec,
            Err(e) => {
                diags.error("Failed to build service spec", e);
                return None;
            }
        };
        let credentials = credentials(&model, diags)?;

        tracing::debug!("Updating Docker service {} at version {}", id, version);
        let Some(version) = update_version(version, diags) else {
            return None;
        };
        let options = bollard::query_parameters::UpdateServiceOptionsBuilder::new()
            .version(version)
            .build();
        if let Err(e) = data
            .docker
            .update_service(&id, spec, options, credentials)
            .await
        {
            diags.error(
                "Docker Service Update Failed",
                format!("Failed to update service {}: {}", id, e),
            );
            return None;
        }

        converge(data, &model, &id, diags).await;
        encode_model(&model, diags)
    }

    async fn delete(&self, data: &ProviderData, state: &Value, diags: &mut Diagnostics) {
        let Some(model) = decode::<ServiceModel>(state, diags) else {
            return;
        };
        let id = model.id.unwrap_or(model.name);
        tracing::debug!("Deleting Docker service {}", id);

        match ignore_not_found(data.docker.delete_service(&id).await.map_err(EngineError::from)) {
            Ok(()) => tracing::debug!("Deleted Docker service {}", id),
            Err(e) => diags.error(
                "Docker Service Deletion Failed",
                format!("Failed to delete service {}: {}", id, e),
            ),
        }
    }

    async fn import(&self, _data: &ProviderData, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let model = ServiceModel {
            id: Some(id.to_string()),
            ..Default::default()
        };
        encode_model(&model, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{
        EndpointSpecModeEnum, MountTypeEnum, ServiceSpecUpdateConfigOrderEnum,
        TaskSpecRestartPolicyConditionEnum,
    };
    use std::time::Duration;

    fn model() -> ServiceModel {
        ServiceModel {
            name: "api".to_string(),
            mode: Some("replicated".to_string()),
            replicas: Some(3),
            task_spec: Some(TaskSpecModel {
                container_spec: Some(ContainerSpecModel {
                    image: "ghcr.io/acme/api:1.0".to_string(),
                    env: Some(BTreeMap::from([("PORT".to_string(), "8080".to_string())])),
                    stop_grace_period: Some("10s".to_string()),
                    mounts: vec![MountModel {
                        target: "/data".to_string(),
                        source: Some("api-data".to_string()),
                        kind: "volume".to_string(),
                        read_only: Some(false),
                    }],
                    hosts: vec![HostModel {
                        host: "db.internal".to_string(),
                        ip: "10.0.0.5".to_string(),
                    }],
                    secrets: vec![FileReferenceModel {
                        id: Some("sec123".to_string()),
                        ref_name: Some("db-password".to_string()),
                        file_name: "db_password".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                restart_policy: Some(RestartPolicyModel {
                    condition: Some("on-failure".to_string()),
                    delay: Some("5s".to_string()),
                    max_attempts: Some(3),
                    window: None,
                }),
                networks: Some(vec!["backend".to_string()]),
                force_update: Some(0),
                ..Default::default()
            }),
            endpoint_spec: Some(EndpointSpecModel {
                mode: Some("vip".to_string()),
                ports: vec![PortConfigModel {
                    target_port: 8080,
                    published_port: Some(80),
                    protocol: Some("tcp".to_string()),
                    publish_mode: Some("ingress".to_string()),
                    ..Default::default()
                }],
            }),
            update_config: Some(UpdateConfigModel {
                parallelism: Some(1),
                delay: Some("0s".to_string()),
                failure_action: Some("pause".to_string()),
                monitor: Some("5s".to_string()),
                max_failure_ratio: None,
                order: Some("start-first".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_spec_mode() {
        let spec = service_spec(&model()).unwrap();
        let mode = spec.mode.unwrap();
        assert_eq!(mode.replicated.unwrap().replicas, Some(3));
        assert!(mode.global.is_none());

        let mut global = model();
        global.mode = Some("global".to_string());
        assert!(service_spec(&global).unwrap().mode.unwrap().global.is_some());

        let mut bad = model();
        bad.mode = Some("daemonset".to_string());
        assert!(service_spec(&bad).is_err());
    }

    #[test]
    fn test_container_spec() {
        let spec = service_spec(&model()).unwrap();
        let task = spec.task_template.unwrap();
        let container = task.container_spec.unwrap();

        assert_eq!(container.env.unwrap(), vec!["PORT=8080".to_string()]);
        assert_eq!(container.stop_grace_period, Some(10_000_000_000));
        assert_eq!(container.hosts.unwrap(), vec!["10.0.0.5 db.internal".to_string()]);

        let mounts = container.mounts.unwrap();
        assert_eq!(mounts[0].typ, Some(MountTypeEnum::VOLUME));

        let secret = &container.secrets.unwrap()[0];
        assert_eq!(secret.secret_name.as_deref(), Some("db-password"));
        let file = secret.file.as_ref().unwrap();
        assert_eq!(file.name.as_deref(), Some("db_password"));
        assert_eq!(file.mode, Some(0o444));
    }

    #[test]
    fn test_task_policies() {
        let spec = service_spec(&model()).unwrap();
        let task = spec.task_template.unwrap();

        let restart = task.restart_policy.unwrap();
        assert_eq!(
            restart.condition,
            Some(TaskSpecRestartPolicyConditionEnum::ON_FAILURE)
        );
        assert_eq!(restart.delay, Some(5_000_000_000));
        assert_eq!(restart.max_attempts, Some(3));

        let networks = task.networks.unwrap();
        assert_eq!(networks[0].target.as_deref(), Some("backend"));
    }

    #[test]
    fn test_endpoint_and_update_config() {
        let spec = service_spec(&model()).unwrap();
        let endpoint = spec.endpoint_spec.unwrap();
        assert_eq!(endpoint.mode, Some(EndpointSpecModeEnum::VIP));
        assert_eq!(endpoint.ports.unwrap()[0].published_port, Some(80));

        let update = spec.update_config.unwrap();
        assert_eq!(update.order, Some(ServiceSpecUpdateConfigOrderEnum::START_FIRST));
        assert_eq!(update.monitor, Some(5_000_000_000));
    }

    #[test]
    fn test_invalid_enum() {
        let mut bad = model();
        if let Some(rp) = bad
            .task_spec
            .as_mut()
            .and_then(|t| t.restart_policy.as_mut())
        {
            rp.condition = Some("sometimes".to_string());
        }
        let err = service_spec(&bad).unwrap_err();
        assert!(err.contains("restart_policy.condition"));
    }

    #[test]
    fn test_converge_defaults() {
        let config = converge_config(&ConvergeConfigModel::default()).unwrap();
        assert_eq!(config, ConvergeConfig::default());

        let config = converge_config(&ConvergeConfigModel {
            delay: Some("1s".to_string()),
            timeout: Some("1m30s".to_string()),
        })
        .unwrap();
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_state_renames_references() {
        let json = model().to_state().unwrap();
        let secret = &json["task_spec"]["container_spec"]["secrets"][0];
        assert_eq!(secret["secret_id"], "sec123");
        assert_eq!(secret["secret_name"], "db-password");
        assert!(secret.get("id").is_none());

        let value = encode_model(&model(), &mut Diagnostics::new()).unwrap();
        let secrets = value
            .get("task_spec")
            .get("container_spec")
            .get("secrets")
            .as_list();
        assert_eq!(secrets[0].get("secret_id"), &Value::string("sec123"));
    }

    #[test]
    fn test_negative_force_update_is_rejected() {
        let mut bad = model();
        if let Some(task) = bad.task_spec.as_mut() {
            task.force_update = Some(-1);
        }
        let err = service_spec(&bad).unwrap_err();
        assert!(err.contains("force_update"));

        let spec = service_spec(&model()).unwrap();
        assert_eq!(spec.task_template.unwrap().force_update, Some(0));
    }

    #[test]
    fn test_update_version_range() {
        let mut diags = Diagnostics::new();
        assert_eq!(update_version(42, &mut diags), Some(42));
        assert!(diags.is_empty());

        assert_eq!(update_version(u64::from(u32::MAX), &mut diags), None);
        assert!(diags.has_error());
    }

    async fn daemon_reporting(update_status: serde_json::Value) -> wiremock::MockServer {
        use wiremock::matchers::{method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/services/svc1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ID": "svc1",
                "UpdateStatus": update_status
            })))
            .mount(&server)
            .await;
        server
    }

    fn waiting_model() -> ServiceModel {
        ServiceModel {
            converge_config: Some(ConvergeConfigModel {
                delay: Some("20ms".to_string()),
                timeout: Some("100ms".to_string()),
            }),
            ..model()
        }
    }

    fn data_for(server: &wiremock::MockServer) -> ProviderData {
        let mut data = crate::common::offline_data();
        data.docker =
            tfdocker_engine::Docker::connect_with_http(&server.uri(), 5, bollard::API_DEFAULT_VERSION)
                .unwrap();
        data
    }

    #[tokio::test]
    async fn test_convergence_timeout_is_warning() {
        let server = daemon_reporting(serde_json::json!({"State": "updating"})).await;
        let data = data_for(&server);

        let mut diags = Diagnostics::new();
        converge(&data, &waiting_model(), "svc1", &mut diags).await;

        assert!(!diags.has_error());
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Service Convergence Timeout"]);
    }

    #[tokio::test]
    async fn test_paused_update_is_warning() {
        let server = daemon_reporting(serde_json::json!({
            "State": "paused",
            "Message": "update paused due to failure"
        }))
        .await;
        let data = data_for(&server);

        let mut diags = Diagnostics::new();
        converge(&data, &waiting_model(), "svc1", &mut diags).await;

        assert!(!diags.has_error());
        let warning = diags.iter().next().unwrap();
        assert_eq!(warning.summary, "Service Update Paused");
        assert!(warning.detail.contains("update paused due to failure"));
    }
}
