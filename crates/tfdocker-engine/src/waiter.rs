//! Swarm サービスの収束待機
//!
//! サービスを `delay` 間隔で inspect し、UpdateStatus が終端状態に
//! なるか `timeout` を過ぎるまで待つ。タイムアウトはエラーではなく
//! [`Convergence::TimedOut`] として返し、呼び出し側が警告にする。

use crate::error::Result;
use bollard::Docker;
use bollard::models::{Service, ServiceUpdateStatusStateEnum};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// 収束待機の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergeConfig {
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(7),
            timeout: Duration::from_secs(180),
        }
    }
}

/// 収束待機の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    Converged,
    /// 更新が一時停止した。メッセージ付き
    Paused(String),
    TimedOut,
}

/// UpdateStatus から収束状態を判定する。`None` はまだ進行中
pub fn evaluate(service: &Service) -> Option<Convergence> {
    let Some(status) = &service.update_status else {
        return Some(Convergence::Converged);
    };

    match status.state {
        None
        | Some(ServiceUpdateStatusStateEnum::EMPTY)
        | Some(ServiceUpdateStatusStateEnum::COMPLETED)
        | Some(ServiceUpdateStatusStateEnum::ROLLBACK_COMPLETED) => Some(Convergence::Converged),
        Some(ServiceUpdateStatusStateEnum::PAUSED)
        | Some(ServiceUpdateStatusStateEnum::ROLLBACK_PAUSED) => Some(Convergence::Paused(
            status.message.clone().unwrap_or_default(),
        )),
        _ => None,
    }
}

/// サービスの収束を待機
///
/// inspect の失敗は警告ログだけ出して次の試行に進む。
pub async fn wait_for_convergence(
    docker: &Docker,
    service_id: &str,
    config: &ConvergeConfig,
) -> Result<Convergence> {
    let deadline = Instant::now() + config.timeout;

    loop {
        match docker
            .inspect_service(
                service_id,
                None::<bollard::query_parameters::InspectServiceOptions>,
            )
            .await
        {
            Ok(service) => {
                if let Some(outcome) = evaluate(&service) {
                    tracing::debug!("Service {} convergence: {:?}", service_id, outcome);
                    return Ok(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to inspect service {} during convergence: {}",
                    service_id,
                    e
                );
            }
        }

        if Instant::now() + config.delay > deadline {
            return Ok(Convergence::TimedOut);
        }
        sleep(config.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::ServiceUpdateStatus;

    fn service_with(state: Option<ServiceUpdateStatusStateEnum>) -> Service {
        Service {
            update_status: Some(ServiceUpdateStatus {
                state,
                message: Some("update paused due to failure".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_update_status_is_converged() {
        assert_eq!(evaluate(&Service::default()), Some(Convergence::Converged));
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(
            evaluate(&service_with(Some(ServiceUpdateStatusStateEnum::COMPLETED))),
            Some(Convergence::Converged)
        );
        assert_eq!(
            evaluate(&service_with(Some(ServiceUpdateStatusStateEnum::PAUSED))),
            Some(Convergence::Paused("update paused due to failure".to_string()))
        );
        assert_eq!(
            evaluate(&service_with(Some(ServiceUpdateStatusStateEnum::UPDATING))),
            None
        );
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

    fn short_wait() -> ConvergeConfig {
        ConvergeConfig {
            delay: Duration::from_millis(20),
            timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_wait_times_out_while_updating() {
        let server = daemon_reporting(serde_json::json!({"State": "updating"})).await;
        let docker =
            Docker::connect_with_http(&server.uri(), 5, bollard::API_DEFAULT_VERSION).unwrap();

        let outcome = wait_for_convergence(&docker, "svc1", &short_wait()).await.unwrap();
        assert_eq!(outcome, Convergence::TimedOut);
    }

    #[tokio::test]
    async fn test_wait_stops_when_paused() {
        let server = daemon_reporting(serde_json::json!({
            "State": "paused",
            "Message": "update paused due to failure"
        }))
        .await;
        let docker =
            Docker::connect_with_http(&server.uri(), 5, bollard::API_DEFAULT_VERSION).unwrap();

        let outcome = wait_for_convergence(&docker, "svc1", &short_wait()).await.unwrap();
        assert_eq!(
            outcome,
            Convergence::Paused("update paused due to failure".to_string())
        );
    }

    #[test]
    fn test_default_config() {
        let config = ConvergeConfig::default();
        assert_eq!(config.delay, Duration::from_secs(7));
        assert_eq!(config.timeout, Duration::from_secs(180));
    }
}
