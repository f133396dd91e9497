//! Lightweight in-process metrics (dependency-free).
//!
//! Stored as atomics behind `DashMap`s and rendered on demand in Prometheus
//! text format via `Endpoint::metrics().render()`.

pub mod metrics;

pub use metrics::EndpointMetrics;
