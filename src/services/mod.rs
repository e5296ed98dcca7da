// Outbound side of the gateway: backend calls, fan-out and health

pub mod aggregator;
pub mod client;
pub mod health;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::FanOutAggregator;
pub use client::{BackendCaller, HttpBackendClient};
pub use health::HealthAggregator;
