// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the ingress status synchronizer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Status Synchronization Constants
// ============================================================================

/// Interval between periodic status reconciliations (60 seconds)
pub const UPDATE_INTERVAL_SECS: u64 = 60;

/// Maximum number of Ingress status updates in flight at once
pub const MAX_CONCURRENT_STATUS_UPDATES: usize = 10;

/// Key used for every periodic sync trigger; all ticks collapse onto it
pub const SYNC_TRIGGER_KEY: &str = "sync status";

/// Resource kind reported in logs
pub const KIND_INGRESS: &str = "Ingress";

/// Maximum time to wait for the initial Ingress cache listing (30 seconds)
pub const INGRESS_CACHE_SYNC_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Ingress Class Constants
// ============================================================================

/// Default value for the leader election id prefix
pub const DEFAULT_ELECTION_ID: &str = "ingress-controller-leader";

/// Ingress class handled when no explicit class is configured
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (30 seconds)
///
/// Renewal happens at half the lease duration and the lease holder is observed
/// every quarter of it.
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 30;

/// Divisor applied to the lease duration to obtain the renew deadline
pub const LEASE_RENEW_DEADLINE_DIVISOR: u64 = 2;

/// Divisor applied to the lease duration to obtain the retry period
pub const LEASE_RETRY_PERIOD_DIVISOR: u64 = 4;

// ============================================================================
// Pod Identity Constants
// ============================================================================

/// Environment variable holding this pod's name (downward API)
pub const POD_NAME_ENV: &str = "POD_NAME";

/// Environment variable holding this pod's namespace (downward API)
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
