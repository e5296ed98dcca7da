use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::models::{BackendRegistry, HealthSnapshot};
use crate::services::client::BackendCaller;

/// Probes every backend concurrently, bounded by a per-probe timeout
pub struct HealthAggregator {
    registry: Arc<BackendRegistry>,
    caller: Arc<dyn BackendCaller>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        caller: Arc<dyn BackendCaller>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            caller,
            probe_timeout,
        }
    }

    pub async fn check_all(&self) -> HealthSnapshot {
        let probes = self.registry.all().iter().map(|backend| async move {
            let up = tokio::time::timeout(
                self.probe_timeout,
                self.caller.probe(backend, self.probe_timeout),
            )
            .await
            .unwrap_or(false);
            (backend.name, up)
        });

        let snapshot = HealthSnapshot::from_probes(join_all(probes).await);
        if !snapshot.is_ok() {
            tracing::warn!(services = ?snapshot.services, "Gateway degraded");
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::models::{BackendName, OverallStatus, ServiceStatus};
    use crate::services::testing::FakeCaller;

    fn health(caller: FakeCaller) -> HealthAggregator {
        HealthAggregator::new(
            Arc::new(BackendRegistry::from_config(&GatewayConfig::default())),
            Arc::new(caller),
            Duration::from_secs(2),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_up() {
        let snapshot = health(FakeCaller::new()).check_all().await;

        assert_eq!(snapshot.status, OverallStatus::Ok);
        assert_eq!(snapshot.services.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_down_is_degraded() {
        let caller = FakeCaller::new().probe_result(BackendName::ObjectDetection, false, 0);
        let snapshot = health(caller).check_all().await;

        assert_eq!(snapshot.status, OverallStatus::Degraded);
        assert_eq!(
            snapshot.services[&BackendName::ObjectDetection],
            ServiceStatus::Down
        );
        assert_eq!(
            snapshot.services[&BackendName::FaceRecognition],
            ServiceStatus::Up
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_counts_as_down() {
        let caller = FakeCaller::new()
            .probe_result(BackendName::FaceRecognition, true, 30_000)
            .probe_result(BackendName::ObjectDetection, false, 0)
            .probe_result(BackendName::SentimentAnalysis, false, 0);

        let started = tokio::time::Instant::now();
        let snapshot = health(caller).check_all().await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(snapshot
            .services
            .values()
            .all(|status| *status == ServiceStatus::Down));
        assert!(!snapshot.is_ok());
    }
}
