//! Compose プロジェクトのライフサイクル
//!
//! Compose CLI の状態は使わず、`com.docker.compose.project` ラベルで
//! プロジェクトに属するコンテナ・ネットワーク・ボリュームを識別する。

use crate::converter::service_to_container;
use crate::error::{EngineError, OptionalExt, Result, ignore_not_found};
use bollard::Docker;
use bollard::models::{ContainerSummary, NetworkCreateRequest, VolumeCreateOptions};
use std::collections::BTreeMap;
use tfdocker_compose::{ComposeFile, LABEL_SERVICE, ProjectNaming, service_order};

/// プロジェクト停止時の猶予（秒）
const STOP_TIMEOUT_SECS: i32 = 10;

/// up 時の挙動
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// 既存コンテナを削除してから作り直す
    pub force_recreate: bool,
    /// ネットワーク・ボリュームの作成失敗を警告に留める
    pub tolerate_resource_errors: bool,
}

/// Compose サービスごとの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub name: String,
    pub container_id: String,
    pub state: String,
    pub status: String,
    pub health: Option<String>,
    pub image: String,
    pub ports: String,
}

pub struct ComposeProject<'a> {
    docker: &'a Docker,
    naming: ProjectNaming,
}

impl<'a> ComposeProject<'a> {
    pub fn new(docker: &'a Docker, name: &str) -> Self {
        Self {
            docker,
            naming: ProjectNaming::new(name),
        }
    }

    pub fn naming(&self) -> &ProjectNaming {
        &self.naming
    }

    /// ネットワーク・ボリューム・コンテナを依存順に作成して起動する
    ///
    /// 警告メッセージを返す。
    pub async fn up(&self, file: &ComposeFile, options: UpOptions) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let order = service_order(file)?;

        for result in [
            self.ensure_networks(file).await,
            self.ensure_volumes(file).await,
        ] {
            match result {
                Ok(()) => {}
                Err(e) if options.tolerate_resource_errors => {
                    tracing::warn!("Compose resource error in {}: {}", self.naming.name(), e);
                    warnings.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        if options.force_recreate {
            self.remove_containers(|_| true).await?;
        }

        for service_name in &order {
            let Some(service) = file.services.get(service_name) else {
                continue;
            };
            let plan = service_to_container(&self.naming, file, service_name, service)?;

            let exists = self
                .docker
                .inspect_container(
                    &plan.name,
                    None::<bollard::query_parameters::InspectContainerOptions>,
                )
                .await
                .map_err(EngineError::from)
                .optional()?
                .is_some();

            if !exists {
                tracing::debug!("Creating container {}", plan.name);
                self.docker
                    .create_container(
                        Some(
                            bollard::query_parameters::CreateContainerOptionsBuilder::new()
                                .name(&plan.name)
                                .build(),
                        ),
                        plan.body,
                    )
                    .await?;
            }

            match self
                .docker
                .start_container(
                    &plan.name,
                    None::<bollard::query_parameters::StartContainerOptions>,
                )
                .await
            {
                // 304: 既に起動している
                Ok(())
                | Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
                }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            "Compose project {} is up ({} services)",
            self.naming.name(),
            order.len()
        );
        Ok(warnings)
    }

    async fn ensure_networks(&self, file: &ComposeFile) -> Result<()> {
        let mut networks: BTreeMap<String, Option<String>> = file
            .networks
            .iter()
            .filter(|(_, def)| !def.external)
            .map(|(name, def)| (name.clone(), def.driver.clone()))
            .collect();
        if file.uses_default_network() {
            networks
                .entry(tfdocker_compose::DEFAULT_NETWORK.to_string())
                .or_insert(None);
        }

        for (name, driver) in networks {
            let scoped = self.naming.scoped_name(&name);
            let existing = self
                .docker
                .inspect_network(
                    &scoped,
                    None::<bollard::query_parameters::InspectNetworkOptions>,
                )
                .await
                .map_err(EngineError::from)
                .optional()?;
            if existing.is_some() {
                continue;
            }

            tracing::debug!("Creating network {}", scoped);
            let request = NetworkCreateRequest {
                name: scoped.clone(),
                driver: Some(driver.unwrap_or_else(|| "bridge".to_string())),
                labels: Some(self.naming.network_labels(&name)),
                ..Default::default()
            };
            match self.docker.create_network(request).await {
                Ok(_)
                | Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 409, ..
                }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn ensure_volumes(&self, file: &ComposeFile) -> Result<()> {
        for (name, def) in file.volumes.iter().filter(|(_, def)| !def.external) {
            let scoped = self.naming.scoped_name(name);
            tracing::debug!("Creating volume {}", scoped);
            self.docker
                .create_volume(VolumeCreateOptions {
                    name: Some(scoped),
                    driver: Some(def.driver.clone().unwrap_or_else(|| "local".to_string())),
                    labels: Some(self.naming.volume_labels(name)),
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    /// プロジェクトのコンテナ一覧
    pub async fn containers(&self, running_only: bool) -> Result<Vec<ContainerSummary>> {
        let mut filters = self.naming.label_filter();
        if running_only {
            filters.insert("status".to_string(), vec!["running".to_string()]);
        }

        Ok(self
            .docker
            .list_containers(Some(bollard::query_parameters::ListContainersOptions {
                all: true,
                filters: Some(filters),
                ..Default::default()
            }))
            .await?)
    }

    pub async fn running_count(&self) -> Result<usize> {
        Ok(self.containers(true).await?.len())
    }

    /// ファイルから消えたサービスのコンテナを削除し、その名前を返す
    pub async fn remove_orphans(&self, file: &ComposeFile) -> Result<Vec<String>> {
        self.remove_containers(|service| !file.services.contains_key(service))
            .await
    }

    /// プロジェクトを削除する
    pub async fn down(&self, remove_volumes: bool) -> Result<()> {
        self.remove_containers(|_| true).await?;

        let label_filter = self.naming.label_filter();

        let networks = self
            .docker
            .list_networks(Some(bollard::query_parameters::ListNetworksOptions {
                filters: Some(label_filter.clone()),
                ..Default::default()
            }))
            .await?;
        for network in networks {
            if let Some(name) = network.name {
                tracing::debug!("Removing network {}", name);
                ignore_not_found(
                    self.docker
                        .remove_network(&name)
                        .await
                        .map_err(EngineError::from),
                )?;
            }
        }

        if remove_volumes {
            let response = self
                .docker
                .list_volumes(Some(bollard::query_parameters::ListVolumesOptions {
                    filters: Some(label_filter),
                    ..Default::default()
                }))
                .await?;
            for volume in response.volumes.unwrap_or_default() {
                tracing::debug!("Removing volume {}", volume.name);
                ignore_not_found(
                    self.docker
                        .remove_volume(
                            &volume.name,
                            None::<bollard::query_parameters::RemoveVolumeOptions>,
                        )
                        .await
                        .map_err(EngineError::from),
                )?;
            }
        }

        tracing::info!("Compose project {} is down", self.naming.name());
        Ok(())
    }

    /// サービスラベルが `predicate` を満たすコンテナを停止・削除する
    async fn remove_containers<F>(&self, predicate: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = Vec::new();

        for container in self.containers(false).await? {
            let service = container
                .labels
                .as_ref()
                .and_then(|l| l.get(LABEL_SERVICE))
                .cloned()
                .unwrap_or_default();
            if !predicate(&service) {
                continue;
            }
            let Some(id) = container.id else {
                continue;
            };

            tracing::debug!("Removing container {} (service {})", id, service);
            self.stop_and_remove(&id).await?;
            removed.push(service);
        }

        Ok(removed)
    }

    async fn stop_and_remove(&self, id: &str) -> Result<()> {
        match self
            .docker
            .stop_container(
                id,
                Some(bollard::query_parameters::StopContainerOptions {
                    t: Some(STOP_TIMEOUT_SECS),
                    signal: None,
                }),
            )
            .await
        {
            Ok(())
            | Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => {}
            Err(e) => return Err(e.into()),
        }

        ignore_not_found(
            self.docker
                .remove_container(
                    id,
                    Some(bollard::query_parameters::RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
                .map_err(EngineError::from),
        )
    }

    /// サービスごとの状態。レプリカが複数あれば起動中のものを優先する
    pub async fn service_statuses(&self) -> Result<Vec<ServiceStatus>> {
        Ok(summarize_services(&self.containers(false).await?))
    }
}

/// コンテナ一覧をサービス単位にまとめる（名前順）
pub fn summarize_services(containers: &[ContainerSummary]) -> Vec<ServiceStatus> {
    let mut services: BTreeMap<String, ServiceStatus> = BTreeMap::new();

    for container in containers {
        let Some(name) = container
            .labels
            .as_ref()
            .and_then(|l| l.get(LABEL_SERVICE))
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        let state = container_state(container);
        let status = container.status.clone().unwrap_or_default();
        let health = (state == "running")
            .then(|| health_from_status(&status))
            .flatten();

        let entry = ServiceStatus {
            name: name.clone(),
            container_id: container
                .id
                .as_deref()
                .map(|id| id.chars().take(12).collect())
                .unwrap_or_default(),
            state,
            status,
            health,
            image: container.image.clone().unwrap_or_default(),
            ports: format_ports(container),
        };

        match services.get(name) {
            Some(existing) if existing.state == "running" || entry.state != "running" => {}
            _ => {
                services.insert(name.clone(), entry);
            }
        }
    }

    services.into_values().collect()
}

/// `Up 3 minutes (healthy)` などの表示からヘルス状態を取り出す
pub fn health_from_status(status: &str) -> Option<String> {
    if status.contains("(healthy)") {
        Some("healthy".to_string())
    } else if status.contains("(unhealthy)") {
        Some("unhealthy".to_string())
    } else if status.contains("starting)") {
        Some("starting".to_string())
    } else {
        None
    }
}

/// コンテナの状態を文字列で返す
pub fn container_state(container: &ContainerSummary) -> String {
    match serde_json::to_value(&container.state) {
        Ok(serde_json::Value::String(state)) => state,
        _ => String::new(),
    }
}

/// `ip:public->private/proto` をカンマ区切りで並べる
pub fn format_ports(container: &ContainerSummary) -> String {
    container
        .ports
        .as_ref()
        .map(|ports| {
            ports
                .iter()
                .map(|p| {
                    let proto = p.typ.as_ref().map(|t| t.to_string()).unwrap_or_else(|| "tcp".into());
                    match p.public_port.filter(|port| *port > 0) {
                        Some(public) => format!(
                            "{}:{}->{}/{}",
                            p.ip.as_deref().unwrap_or(""),
                            public,
                            p.private_port,
                            proto
                        ),
                        None => format!("{}/{}", p.private_port, proto),
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{Port, PortTypeEnum};

    fn summary(id: &str, service: &str, state: &str, status: &str) -> ContainerSummary {
        let mut value = serde_json::json!({
            "Id": id,
            "Image": "nginx:1.27",
            "State": state,
            "Status": status,
            "Labels": {
                "com.docker.compose.project": "shop",
                "com.docker.compose.service": service,
            },
        });
        if service.is_empty() {
            value["Labels"] = serde_json::json!({});
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_health_from_status() {
        assert_eq!(
            health_from_status("Up 3 minutes (healthy)").as_deref(),
            Some("healthy")
        );
        assert_eq!(
            health_from_status("Up 1 second (unhealthy)").as_deref(),
            Some("unhealthy")
        );
        assert_eq!(
            health_from_status("Up 2 seconds (health: starting)").as_deref(),
            Some("starting")
        );
        assert_eq!(health_from_status("Up 5 minutes"), None);
    }

    #[test]
    fn test_format_ports() {
        let container = ContainerSummary {
            ports: Some(vec![
            Port {
                ip: Some("0.0.0.0".to_string()),
                private_port: 80,
                public_port: Some(8080),
                typ: Some(PortTypeEnum::TCP),
            },
            Port {
                ip: None,
                private_port: 53,
                public_port: None,
                typ: Some(PortTypeEnum::UDP),
            },
            ]),
            ..Default::default()
        };
        assert_eq!(format_ports(&container), "0.0.0.0:8080->80/tcp, 53/udp");
    }

    #[test]
    fn test_summarize_prefers_running_replica() {
        let containers = vec![
            summary(
                "aaaaaaaaaaaaaaaaaaaa",
                "web",
                "exited",
                "Exited (0) 1 minute ago",
            ),
            summary(
                "bbbbbbbbbbbbbbbbbbbb",
                "web",
                "running",
                "Up 2 minutes (healthy)",
            ),
            summary("cccccccccccccccccccc", "db", "running", "Up 2 minutes"),
            summary("dddddddddddddddddddd", "", "running", "Up"),
        ];

        let services = summarize_services(&containers);
        assert_eq!(services.len(), 2);

        // 名前順
        assert_eq!(services[0].name, "db");
        assert_eq!(services[0].health, None);

        let web = &services[1];
        assert_eq!(web.container_id, "bbbbbbbbbbbb");
        assert_eq!(web.state, "running");
        assert_eq!(web.health.as_deref(), Some("healthy"));
    }

    #[test]
    fn test_health_only_for_running() {
        let containers = vec![summary(
            "eeeeeeeeeeeeeeee",
            "web",
            "exited",
            "Exited (1) (unhealthy)",
        )];
        assert_eq!(summarize_services(&containers)[0].health, None);
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_up_and_down() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let file = tfdocker_compose::parse_compose(
            "services:\n  app:\n    image: alpine:3.20\n    command: sleep 300\n",
        )
        .unwrap();

        crate::image::ImageManager::new(&docker)
            .pull("alpine:3.20", None)
            .await
            .unwrap();

        let project = ComposeProject::new(&docker, "tfdocker-test");
        project.up(&file, UpOptions::default()).await.unwrap();
        assert_eq!(project.running_count().await.unwrap(), 1);

        project.down(true).await.unwrap();
        assert!(project.containers(false).await.unwrap().is_empty());
    }
}
