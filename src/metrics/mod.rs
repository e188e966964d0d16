//! Prometheus metrics for the refresh loop and query server
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_counter_vec,
    CounterVec, Encoder, Gauge, Histogram, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Refresh loop metrics
struct RefreshMetrics {
    cycles: IntCounterVec,
    duration: Histogram,
    nodes_listed: Gauge,
    match_groups: Gauge,
}

/// Query server metrics
struct ServerMetrics {
    requests: IntCounterVec,
    serialize_seconds: CounterVec,
}

static REFRESH_METRICS: OnceLock<RefreshMetrics> = OnceLock::new();

static SERVER_METRICS: OnceLock<ServerMetrics> = OnceLock::new();

/// Outcome of the one registration attempt
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Registers into the default registry. Later calls return the outcome of
/// the first one; concurrent callers wait for it.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    METRICS_INIT
        .get_or_init(|| register_metrics().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let refresh = RefreshMetrics {
        cycles: register_int_counter_vec!(
            "zonewatch_refresh_cycles_total",
            "Refresh cycles by outcome",
            &["outcome"]
        )?,
        duration: register_histogram!(
            "zonewatch_refresh_duration_seconds",
            "Time spent listing nodes and building a snapshot",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        )?,
        nodes_listed: register_gauge!(
            "zonewatch_nodes_listed",
            "Nodes returned by the last listing"
        )?,
        match_groups: register_gauge!(
            "zonewatch_match_groups",
            "Match groups in the published snapshot"
        )?,
    };

    let server = ServerMetrics {
        requests: register_int_counter_vec!(
            "zonewatch_http_requests_total",
            "HTTP requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        serialize_seconds: register_counter_vec!(
            "zonewatch_snapshot_serialize_seconds_total",
            "Cumulative time spent serializing snapshots",
            &["endpoint"]
        )?,
    };

    REFRESH_METRICS
        .set(refresh)
        .map_err(|_| "Refresh metrics already initialized")?;
    SERVER_METRICS
        .set(server)
        .map_err(|_| "Server metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    REFRESH_METRICS.get().is_some() && SERVER_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one refresh cycle
pub fn record_refresh(elapsed: Duration, success: bool, nodes: usize, groups: usize) {
    let Some(m) = REFRESH_METRICS.get() else {
        return;
    };

    let outcome = if success { "success" } else { "error" };
    m.cycles.with_label_values(&[outcome]).inc();
    m.duration.observe(elapsed.as_secs_f64());
    m.nodes_listed.set(nodes as f64);
    m.match_groups.set(groups as f64);
}

/// Record one served HTTP request
pub fn record_request(endpoint: &str, status: u16) {
    if let Some(m) = SERVER_METRICS.get() {
        let status = status.to_string();
        m.requests
            .with_label_values(&[endpoint, status.as_str()])
            .inc();
    }
}

/// Record time spent serializing a response body
pub fn record_serialize(endpoint: &str, elapsed: Duration) {
    if let Some(m) = SERVER_METRICS.get() {
        m.serialize_seconds
            .with_label_values(&[endpoint])
            .inc_by(elapsed.as_secs_f64());
    }
}

// ============================================================================
// Tests
// ============================================================================
