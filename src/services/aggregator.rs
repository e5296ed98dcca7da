use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::config::GatewayConfig;
use crate::middleware::logging::create_operation_span;
use crate::models::{
    AnalysisKind, AnalysisRequest, BackendFailure, BackendOutcome, BackendRegistry, CombinedResult,
};
use crate::services::client::BackendCaller;

/// Runs the analyses of one combined request concurrently and merges the
/// results by analysis, never by completion order.
pub struct FanOutAggregator {
    registry: Arc<BackendRegistry>,
    caller: Arc<dyn BackendCaller>,
    call_timeout: Duration,
    deadline: Duration,
}

impl FanOutAggregator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        caller: Arc<dyn BackendCaller>,
        call_timeout: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            caller,
            call_timeout,
            deadline,
        }
    }

    pub fn from_config(
        config: &GatewayConfig,
        registry: Arc<BackendRegistry>,
        caller: Arc<dyn BackendCaller>,
    ) -> Self {
        Self::new(
            registry,
            caller,
            Duration::from_secs(config.aggregation.call_timeout_seconds),
            Duration::from_millis(config.aggregation.deadline_millis),
        )
    }

    /// Issue every analysis, wait for all of them or the deadline, and assemble.
    /// Analyses still running at the deadline are cancelled and reported failed.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        kinds: &[AnalysisKind],
        request_id: &str,
    ) -> CombinedResult {
        let span = create_operation_span("analyze_all", request_id);
        self.run_inner(request, kinds, request_id)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request: &AnalysisRequest,
        kinds: &[AnalysisKind],
        request_id: &str,
    ) -> CombinedResult {
        let started = Instant::now();
        let deadline = started + self.deadline;

        let mut join_set = JoinSet::new();
        let mut pending = HashMap::with_capacity(kinds.len());
        for kind in kinds.iter().copied() {
            let caller = Arc::clone(&self.caller);
            let backend = self.registry.get(kind.backend()).clone();
            let payload = kind.payload(request);
            let timeout = self.call_timeout;
            let request_id = request_id.to_string();

            let handle = join_set.spawn(async move {
                caller
                    .call(&backend, kind.path(), &payload, timeout, &request_id)
                    .await
            });
            pending.insert(handle.id(), kind);
        }

        let mut outcomes = BTreeMap::new();

        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next_with_id()).await {
                Ok(Some(Ok((id, outcome)))) => {
                    let Some(kind) = pending.remove(&id) else { continue };
                    debug!(
                        analysis = ?kind,
                        succeeded = outcome.succeeded(),
                        latency_ms = outcome.latency.as_millis() as u64,
                        "Analysis completed"
                    );
                    outcomes.insert(kind, outcome);
                }
                Ok(Some(Err(err))) => {
                    let Some(kind) = pending.remove(&err.id()) else { continue };
                    warn!(analysis = ?kind, "Analysis task failed: {}", err);
                    outcomes.insert(
                        kind,
                        BackendOutcome::failure(
                            kind.backend(),
                            BackendFailure::TaskFailed(err.to_string()),
                            started.elapsed(),
                        ),
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = join_set.len(),
                        deadline_ms = self.deadline.as_millis() as u64,
                        "Combined analysis deadline exceeded"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        for kind in pending.into_values() {
            outcomes.insert(
                kind,
                BackendOutcome::failure(kind.backend(), BackendFailure::DeadlineExceeded, elapsed),
            );
        }

        let succeeded = outcomes.values().filter(|o| o.succeeded()).count();
        info!(
            succeeded,
            total = outcomes.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Combined analysis finished"
        );

        CombinedResult::assemble(request, kinds, outcomes)
    }
}
