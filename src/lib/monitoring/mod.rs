//! Monitoring surface of the ping monitor.
//!
//! Exposes the aggregate state over HTTP:
//!
//! - **`/metrics`**: Prometheus text listing rendered from a fresh snapshot on every scrape
//! - **`/health`**: liveness check, independent of dish reachability
//!
//! Read-only with respect to the readings: the only state a request changes is the scrape
//! counter.

pub mod http_server;
pub mod prometheus_metrics;

pub use http_server::{router, MonitoringServer};
