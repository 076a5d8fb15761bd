//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_broadcast_attempts_total` (counter): broadcasts by result
//! - `relay_submission_outcomes_total` (counter): terminal outcomes
//! - `relay_fee_bumps_total` (counter): tip bumps after rejections
//! - `relay_nonce_resyncs_total` (counter): nonce re-reads that moved the nonce
//! - `relay_top_ups_total` (counter): funding transfers by result
//! - `relay_rpc_errors_total` (counter): RPC failures by operation
//! - `relay_confirmation_seconds` (histogram): broadcast to receipt
//!
//! Without an installed recorder every call here is a no-op.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {}", e))?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_broadcast(result: &'static str) {
    ::metrics::counter!("relay_broadcast_attempts_total", "result" => result).increment(1);
}

pub fn record_submission_outcome(outcome: &'static str) {
    ::metrics::counter!("relay_submission_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_fee_bump() {
    ::metrics::counter!("relay_fee_bumps_total").increment(1);
}

pub fn record_nonce_resync() {
    ::metrics::counter!("relay_nonce_resyncs_total").increment(1);
}

pub fn record_top_up(result: &'static str) {
    ::metrics::counter!("relay_top_ups_total", "result" => result).increment(1);
}

pub fn record_rpc_error(op: &'static str) {
    ::metrics::counter!("relay_rpc_errors_total", "op" => op).increment(1);
}

pub fn record_confirmation_time(elapsed: Duration) {
    ::metrics::histogram!("relay_confirmation_seconds").record(elapsed.as_secs_f64());
}
