//! Metrics and observability utilities
//!
//! Prometheus metrics for the gateway and the remote session manager,
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SchoolBridge metrics
pub const METRICS_PREFIX: &str = "schoolbridge";

/// Histogram buckets for gateway request latency (in seconds).
/// Most requests wait on a school portal, so the tail is long.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Portal metrics
    describe_counter!(
        format!("{}_portal_fetches_total", METRICS_PREFIX),
        Unit::Count,
        "Portal operations by outcome"
    );

    describe_histogram!(
        format!("{}_portal_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Portal operation latency in seconds"
    );

    describe_counter!(
        format!("{}_portal_logins_total", METRICS_PREFIX),
        Unit::Count,
        "Portal login attempts by outcome"
    );

    describe_counter!(
        format!("{}_relogins_total", METRICS_PREFIX),
        Unit::Count,
        "Relogins triggered by a stale remote session"
    );

    // Session metrics
    describe_gauge!(
        format!("{}_remote_sessions", METRICS_PREFIX),
        Unit::Count,
        "Remote sessions held in the registry"
    );

    describe_counter!(
        format!("{}_sessions_evicted_total", METRICS_PREFIX),
        Unit::Count,
        "Remote sessions evicted for inactivity"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one portal operation
pub fn record_portal_fetch(operation: &'static str, outcome: &'static str, duration_secs: f64) {
    counter!(
        format!("{}_portal_fetches_total", METRICS_PREFIX),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_portal_fetch_duration_seconds", METRICS_PREFIX),
        "operation" => operation
    )
    .record(duration_secs);
}

/// Record one portal login attempt
pub fn record_login(portal: &'static str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_portal_logins_total", METRICS_PREFIX),
        "portal" => portal,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a relogin caused by a stale remote session
pub fn record_relogin(operation: &'static str) {
    counter!(
        format!("{}_relogins_total", METRICS_PREFIX),
        "operation" => operation
    )
    .increment(1);
}

/// Publish the number of live remote sessions
pub fn record_remote_sessions(count: usize) {
    gauge!(format!("{}_remote_sessions", METRICS_PREFIX)).set(count as f64);
}

/// Record idle evictions
pub fn record_evictions(count: usize) {
    counter!(format!("{}_sessions_evicted_total", METRICS_PREFIX)).increment(count as u64);
}
