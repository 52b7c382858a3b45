//! Metrics collection and exposition.
//!
//! # Metrics
//! - `attendance_records_total` (counter): recorded writes by status, duplicate
//! - `attendance_validation_checks_total` (counter): checks by dependency, outcome
//! - `attendance_circuit_transitions_total` (counter): breaker transitions
//! - `attendance_bulkhead_rejections_total` (counter): pool rejections
//! - `attendance_events_total` (counter): outbound queue activity by outcome
//! - `attendance_store_records` (gauge): rows currently in the store

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

/// One attendance write reached the store.
pub fn record_attendance_write(status: &str, duplicate: bool) {
    counter!(
        "attendance_records_total",
        "status" => status.to_string(),
        "duplicate" => if duplicate { "true" } else { "false" },
    )
    .increment(1);
}

/// One existence check completed with the given outcome
/// ("exists", "not_found", "unreachable", "circuit_open").
pub fn record_validation_check(dependency: &str, outcome: &'static str) {
    counter!(
        "attendance_validation_checks_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// A circuit breaker changed state.
pub fn record_circuit_transition(dependency: &str, new_state: &str) {
    counter!(
        "attendance_circuit_transitions_total",
        "dependency" => dependency.to_string(),
        "state" => new_state.to_string(),
    )
    .increment(1);
}

/// A bulkhead pool turned an operation away.
pub fn record_bulkhead_rejection(pool: &str) {
    counter!(
        "attendance_bulkhead_rejections_total",
        "pool" => pool.to_string(),
    )
    .increment(1);
}

/// Outbound event queue activity ("enqueued", "dropped", "delivered", "failed").
pub fn record_event(outcome: &'static str) {
    counter!("attendance_events_total", "outcome" => outcome).increment(1);
}

/// Current number of records held by the store.
pub fn record_store_size(records: usize) {
    gauge!("attendance_store_records").set(records as f64);
}
