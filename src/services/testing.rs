use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Backend, BackendFailure, BackendName, BackendOutcome};
use crate::services::client::BackendCaller;

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Fail(BackendFailure),
    Panic,
}

/// Scripted answer for one upstream path
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    reply: Reply,
    delay: Duration,
}

impl FakeBehavior {
    pub fn ok(body: Value) -> Self {
        Self {
            reply: Reply::Ok(body),
            delay: Duration::ZERO,
        }
    }

    pub fn fail(failure: BackendFailure) -> Self {
        Self {
            reply: Reply::Fail(failure),
            delay: Duration::ZERO,
        }
    }

    pub fn panics() -> Self {
        Self {
            reply: Reply::Panic,
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

/// In-process [`BackendCaller`] driven by the tokio clock
#[derive(Default)]
pub struct FakeCaller {
    behaviors: HashMap<String, FakeBehavior>,
    probes: HashMap<BackendName, (bool, Duration)>,
    calls: Mutex<Vec<(BackendName, String, Value)>>,
}

impl FakeCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, path: &str, behavior: FakeBehavior) -> Self {
        self.behaviors.insert(path.to_string(), behavior);
        self
    }

    pub fn probe_result(mut self, backend: BackendName, up: bool, delay_ms: u64) -> Self {
        self.probes
            .insert(backend, (up, Duration::from_millis(delay_ms)));
        self
    }

    pub fn calls_to(&self, backend: BackendName) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| *name == backend)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_payload(&self, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, p, _)| p == path)
            .map(|(_, _, payload)| payload.clone())
    }
}

#[async_trait]
impl BackendCaller for FakeCaller {
    async fn call(
        &self,
        backend: &Backend,
        path: &str,
        payload: &Value,
        timeout: Duration,
        _request_id: &str,
    ) -> BackendOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((backend.name, path.to_string(), payload.clone()));

        let behavior = self.behaviors.get(path).cloned().unwrap_or_else(|| {
            FakeBehavior::fail(BackendFailure::Unreachable("connection failed".to_string()))
        });

        if behavior.delay > timeout {
            tokio::time::sleep(timeout).await;
            return BackendOutcome::failure(backend.name, BackendFailure::Timeout(timeout), timeout);
        }
        tokio::time::sleep(behavior.delay).await;

        match behavior.reply {
            Reply::Ok(body) => BackendOutcome::success(backend.name, 200, body, behavior.delay),
            Reply::Fail(failure) => BackendOutcome::failure(backend.name, failure, behavior.delay),
            Reply::Panic => panic!("scripted backend panic on {}", path),
        }
    }

    async fn probe(&self, backend: &Backend, _timeout: Duration) -> bool {
        let (up, delay) = self
            .probes
            .get(&backend.name)
            .copied()
            .unwrap_or((true, Duration::ZERO));
        tokio::time::sleep(delay).await;
        up
    }
}
