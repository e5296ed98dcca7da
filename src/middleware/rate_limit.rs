use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::models::{BackendName, BackendRegistry};

#[derive(Debug)]
struct RateWindow {
    count: u32,
    reset_at: Option<Instant>,
}

impl RateWindow {
    /// Start a fresh window once the current one has elapsed
    fn roll(&mut self, now: Instant, length: Duration) {
        match self.reset_at {
            Some(reset_at) if now < reset_at => {}
            _ => {
                self.count = 0;
                self.reset_at = Some(now + length);
            }
        }
    }

    fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at
            .map(|reset_at| reset_at.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct BackendLimit {
    limit: u32,
    window: Mutex<RateWindow>,
}

/// Point-in-time view of one backend's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub count: u32,
    pub limit: u32,
    pub resets_in: Option<Duration>,
}

/// Fixed-window admission control, one counter per backend.
///
/// Windows start on the first admission for a backend and every request
/// checked against that backend counts, whatever the caller or route.
#[derive(Debug)]
pub struct RateLimiter {
    window_length: Duration,
    limits: BTreeMap<BackendName, BackendLimit>,
}

impl RateLimiter {
    pub fn new(
        window_length: Duration,
        limits: impl IntoIterator<Item = (BackendName, u32)>,
    ) -> Self {
        let limits = limits
            .into_iter()
            .map(|(name, limit)| {
                (
                    name,
                    BackendLimit {
                        limit,
                        window: Mutex::new(RateWindow {
                            count: 0,
                            reset_at: None,
                        }),
                    },
                )
            })
            .collect();

        Self {
            window_length,
            limits,
        }
    }

    pub fn from_registry(registry: &BackendRegistry, window_length: Duration) -> Self {
        Self::new(
            window_length,
            registry.all().iter().map(|b| (b.name, b.rate_limit)),
        )
    }

    fn entry(&self, backend: BackendName) -> Result<&BackendLimit, GatewayError> {
        self.limits.get(&backend).ok_or_else(|| {
            GatewayError::InternalError(format!("No rate limit configured for {}", backend))
        })
    }

    /// Count one request against `backend`, or reject it without counting
    pub async fn admit(&self, backend: BackendName) -> Result<(), GatewayError> {
        let entry = self.entry(backend)?;
        let now = Instant::now();
        let mut window = entry.window.lock().await;
        window.roll(now, self.window_length);

        if window.count >= entry.limit {
            tracing::warn!(backend = %backend, limit = entry.limit, "Rate limit exceeded");
            return Err(GatewayError::RateLimited {
                backend,
                retry_after: window.retry_after(now),
            });
        }

        window.count += 1;
        Ok(())
    }

    /// Admit one request against every listed backend, or none of them.
    ///
    /// Locks are taken in backend order so concurrent callers cannot deadlock.
    pub async fn admit_all(&self, backends: &[BackendName]) -> Result<(), GatewayError> {
        let mut wanted = backends.to_vec();
        wanted.sort();
        wanted.dedup();

        let now = Instant::now();
        let mut guards = Vec::with_capacity(wanted.len());
        for backend in &wanted {
            let entry = self.entry(*backend)?;
            let mut window = entry.window.lock().await;
            window.roll(now, self.window_length);
            guards.push((*backend, entry.limit, window));
        }

        if let Some((backend, limit, window)) =
            guards.iter().find(|(_, limit, window)| window.count >= *limit)
        {
            tracing::warn!(backend = %backend, limit = *limit, "Rate limit exceeded");
            return Err(GatewayError::RateLimited {
                backend: *backend,
                retry_after: window.retry_after(now),
            });
        }

        for (_, _, window) in guards.iter_mut() {
            window.count += 1;
        }
        Ok(())
    }

    pub async fn snapshot(&self, backend: BackendName) -> Option<WindowSnapshot> {
        let entry = self.limits.get(&backend)?;
        let window = entry.window.lock().await;
        let now = Instant::now();
        let expired = window.reset_at.map_or(true, |reset_at| now >= reset_at);

        Some(WindowSnapshot {
            count: if expired { 0 } else { window.count },
            limit: entry.limit,
            resets_in: if expired { None } else { Some(window.retry_after(now)) },
        })
    }
}
