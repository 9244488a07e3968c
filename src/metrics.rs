// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the ingress status synchronizer.
//!
//! All metrics share the `ingress_status_` prefix.
//!
//! # Metrics Categories
//!
//! - **Sync Cycle Metrics** - Outcome and duration of each reconcile cycle
//! - **Status Update Metrics** - Per-Ingress outcome of status writes
//! - **Leader Election Metrics** - Leadership transitions and current state
//!
//! # Example
//!
//! ```rust,no_run
//! use ingress_status::metrics::record_sync_cycle;
//!
//! record_sync_cycle("success", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "ingress_status";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Sync Cycle Metrics
// ============================================================================

/// Total number of reconcile cycles by outcome
///
/// Labels:
/// - `outcome`: `success`, `partial_failure`, `discovery_error`
pub static SYNC_CYCLES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sync_cycles_total"),
        "Total number of status reconcile cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconcile cycles in seconds
///
/// Labels:
/// - `outcome`: same values as [`SYNC_CYCLES_TOTAL`]
pub static SYNC_CYCLE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_sync_cycle_duration_seconds"),
        "Duration of status reconcile cycles in seconds",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Number of addresses discovered in the most recent cycle
pub static PUBLISHED_ADDRESSES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_published_addresses"),
        "Number of addresses discovered for publication in the last cycle",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Status Update Metrics
// ============================================================================

/// Total number of per-Ingress status update outcomes
///
/// Labels:
/// - `outcome`: `updated`, `unchanged`, `conflict`, `failed`, `cancelled`
pub static STATUS_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_status_updates_total"),
        "Total number of Ingress status update outcomes",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leadership transitions
///
/// Labels:
/// - `transition`: `acquired`, `lost`, `observed`
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leadership transitions",
    );
    let counter = CounterVec::new(opts, &["transition"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Whether this pod currently holds the status leadership (1) or not (0)
///
/// Labels:
/// - `pod_name`: Name of this pod
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leadership status of this pod (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome and duration of a reconcile cycle
pub fn record_sync_cycle(outcome: &str, duration: Duration) {
    SYNC_CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    SYNC_CYCLE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record the number of addresses discovered in a cycle
#[allow(clippy::cast_precision_loss)]
pub fn record_published_addresses(count: usize) {
    PUBLISHED_ADDRESSES.set(count as f64);
}

/// Record `count` status update outcomes of one kind
#[allow(clippy::cast_precision_loss)]
pub fn record_status_updates(outcome: &str, count: usize) {
    if count > 0 {
        STATUS_UPDATES_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count as f64);
    }
}

/// Record leadership acquired by this pod
pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["acquired"])
        .inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

/// Record leadership lost by this pod
pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Record a new lease holder observed (any pod)
pub fn record_leader_observed() {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["observed"])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
