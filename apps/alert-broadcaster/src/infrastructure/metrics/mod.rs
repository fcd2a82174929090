//! Prometheus Metrics Module
//!
//! Exposes broadcaster metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: alerts accepted from the monitoring jobs
//! - **Queue**: cap evictions per tier
//! - **Delivery**: batches and per-connection deliveries, failures
//! - **Connections**: live WebSocket client count
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::tier::Tier;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "volspike_alerts_ingested_total",
        "Total alerts accepted from the monitoring jobs"
    );
    describe_counter!(
        "volspike_alerts_dropped_total",
        "Total alerts evicted by pending-batch caps"
    );
    describe_counter!(
        "volspike_batches_delivered_total",
        "Total boundary batches delivered per tier"
    );
    describe_counter!(
        "volspike_alerts_delivered_total",
        "Total alerts carried by delivered batches per tier"
    );
    describe_counter!(
        "volspike_deliveries_total",
        "Total per-connection batch deliveries"
    );
    describe_counter!(
        "volspike_delivery_failures_total",
        "Total failed per-connection deliveries by reason"
    );
    describe_counter!(
        "volspike_ingest_rejected_total",
        "Total ingestion requests rejected (bad key or payload)"
    );
    describe_gauge!(
        "volspike_connections",
        "Number of live WebSocket client connections"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an alert accepted at the ingestion boundary.
pub fn record_alert_ingested(kind: &'static str) {
    counter!(
        "volspike_alerts_ingested_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record alerts evicted by a tier's pending-batch cap.
pub fn record_alerts_dropped(tier: Tier, count: u64) {
    counter!(
        "volspike_alerts_dropped_total",
        "tier" => tier.as_str()
    )
    .increment(count);
}

/// Record a completed boundary batch and its fan-out.
pub fn record_batch_delivered(tier: Tier, alerts: u64, connections: u64) {
    counter!(
        "volspike_batches_delivered_total",
        "tier" => tier.as_str()
    )
    .increment(1);
    counter!(
        "volspike_alerts_delivered_total",
        "tier" => tier.as_str()
    )
    .increment(alerts);
    counter!(
        "volspike_deliveries_total",
        "tier" => tier.as_str()
    )
    .increment(connections);
}

/// Record a failed per-connection delivery.
pub fn record_delivery_failure(tier: Tier, reason: &'static str) {
    counter!(
        "volspike_delivery_failures_total",
        "tier" => tier.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a rejected ingestion request.
pub fn record_ingest_rejected(reason: &'static str) {
    counter!(
        "volspike_ingest_rejected_total",
        "reason" => reason
    )
    .increment(1);
}

/// Update the live connection gauge.
pub fn set_connections(count: f64) {
    gauge!("volspike_connections").set(count);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        // The metrics facade silently drops records when no recorder is
        // installed; these must not panic in unit tests.
        record_alert_ingested("volume_spike");
        record_alerts_dropped(Tier::Pro, 3);
        record_batch_delivered(Tier::Elite, 1, 5);
        record_delivery_failure(Tier::Free, "closed");
        record_ingest_rejected("bad_key");
        set_connections(2.0);
    }
}
