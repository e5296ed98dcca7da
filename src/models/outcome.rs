use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::models::BackendName;

/// Why a single backend call did not yield a usable result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendFailure {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Unreachable(String),

    #[error("HTTP {status}{}", message_suffix(.body))]
    Status { status: u16, body: Option<Value> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Rejected(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("analysis task failed: {0}")]
    TaskFailed(String),
}

fn message_suffix(body: &Option<Value>) -> String {
    body.as_ref()
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

/// Result of one backend call, produced once and consumed by whoever issued it
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub backend: BackendName,

    /// Upstream status, when a response was received at all
    pub status: Option<u16>,

    pub result: Result<Value, BackendFailure>,

    pub latency: Duration,
}

impl BackendOutcome {
    pub fn success(backend: BackendName, status: u16, payload: Value, latency: Duration) -> Self {
        Self {
            backend,
            status: Some(status),
            result: Ok(payload),
            latency,
        }
    }

    pub fn failure(backend: BackendName, failure: BackendFailure, latency: Duration) -> Self {
        let status = match &failure {
            BackendFailure::Status { status, .. } => Some(*status),
            _ => None,
        };

        Self {
            backend,
            status,
            result: Err(failure),
            latency,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Body returned by the backend, whether or not the call succeeded
    pub fn body(&self) -> Option<&Value> {
        match &self.result {
            Ok(payload) => Some(payload),
            Err(BackendFailure::Status { body, .. }) => body.as_ref(),
            Err(_) => None,
        }
    }

    /// Apply the downstream `{success, message}` envelope: a 2xx body that
    /// reports `success: false` is a failure.
    pub fn interpret(&self) -> Result<&Value, BackendFailure> {
        match &self.result {
            Ok(payload) if payload.get("success").and_then(Value::as_bool) == Some(false) => {
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("backend reported failure");
                Err(BackendFailure::Rejected(message.to_string()))
            }
            Ok(payload) => Ok(payload),
            Err(failure) => Err(failure.clone()),
        }
    }
}
