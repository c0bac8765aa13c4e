//! Prometheus metrics for relay observability.
//!
//! Metrics are exposed on a dedicated listener when `METRICS_PORT` is set.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `relay_requests_total` - Relay attempts by outcome (`success`,
//!   `upstream_error`, `timeout`, `connection_failed`, `transport_error`,
//!   `rejected`)
//!
//! ## Histograms
//! - `relay_upstream_duration_seconds` - Time spent waiting on destinations
//! - `relay_request_duration_seconds` - Total handling time (with label: status)
//!
//! # Usage
//!
//! ```rust,ignore
//! use webhook_relay::metrics::{init_metrics, record_relay_outcome};
//!
//! init_metrics("0.0.0.0:9090".parse()?)?;
//! record_relay_outcome("success");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const RELAY_REQUESTS_TOTAL: &str = "relay_requests_total";
    pub const UPSTREAM_DURATION_SECONDS: &str = "relay_upstream_duration_seconds";
    pub const REQUEST_DURATION_SECONDS: &str = "relay_request_duration_seconds";
}

/// Initialize the Prometheus metrics exporter on `metrics_addr`.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::RELAY_REQUESTS_TOTAL,
        "Total number of relay attempts by outcome"
    );
    describe_histogram!(
        names::UPSTREAM_DURATION_SECONDS,
        "Time spent waiting on the destination in seconds"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "Total relay request handling time in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Count one relay attempt.
pub fn record_relay_outcome(outcome: &'static str) {
    counter!(names::RELAY_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record time spent waiting on the destination.
pub fn record_upstream_duration(duration_secs: f64) {
    histogram!(names::UPSTREAM_DURATION_SECONDS).record(duration_secs);
}

/// Record total handling time of one relay request.
pub fn record_request_duration(status: u16, duration_secs: f64) {
    histogram!(names::REQUEST_DURATION_SECONDS, "status" => status.to_string())
        .record(duration_secs);
}
