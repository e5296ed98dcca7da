use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::BackendName;

/// Liveness of a single backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
}

/// Aggregate liveness across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Ok,
    Degraded,
}

/// Point-in-time liveness of every backend queried for one health request
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: OverallStatus,
    pub services: BTreeMap<BackendName, ServiceStatus>,
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Build a snapshot from probe results; `ok` only when every backend is up
    pub fn from_probes(probes: impl IntoIterator<Item = (BackendName, bool)>) -> Self {
        let services: BTreeMap<BackendName, ServiceStatus> = probes
            .into_iter()
            .map(|(name, up)| {
                let status = if up { ServiceStatus::Up } else { ServiceStatus::Down };
                (name, status)
            })
            .collect();

        let status = if !services.is_empty() && services.values().all(|s| *s == ServiceStatus::Up) {
            OverallStatus::Ok
        } else {
            OverallStatus::Degraded
        };

        Self {
            status,
            services,
            timestamp: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OverallStatus::Ok
    }
}
