// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration for the status synchronizer.
//!
//! Configuration comes from command-line flags, each of which can also be set
//! through an environment variable. [`Cli`] is the parsed form and
//! [`SyncConfig`] the validated form handed to the rest of the crate.

use crate::constants::{
    DEFAULT_ELECTION_ID, DEFAULT_INGRESS_CLASS, DEFAULT_LEASE_DURATION_SECS,
    LEASE_RENEW_DEADLINE_DIVISOR, LEASE_RETRY_PERIOD_DIVISOR, MAX_CONCURRENT_STATUS_UPDATES,
    METRICS_SERVER_PORT, UPDATE_INTERVAL_SECS,
};
use crate::errors::StartupError;
use clap::Parser;
use std::time::Duration;

/// Command-line interface of the `ingress-status` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ingress-status",
    version,
    about = "Publishes the addresses of a replicated ingress controller into Ingress status"
)]
pub struct Cli {
    /// Prefix of the leader election lock name
    #[arg(long, env = "ELECTION_ID", default_value = DEFAULT_ELECTION_ID)]
    pub election_id: String,

    /// Ingress class assumed when no explicit class is configured
    #[arg(long, env = "DEFAULT_INGRESS_CLASS", default_value = DEFAULT_INGRESS_CLASS)]
    pub default_ingress_class: String,

    /// Ingress class this controller instance is responsible for
    #[arg(long, env = "INGRESS_CLASS")]
    pub ingress_class: Option<String>,

    /// Seconds between periodic status reconciliations
    #[arg(long, env = "UPDATE_INTERVAL_SECS", default_value_t = UPDATE_INTERVAL_SECS)]
    pub update_interval_secs: u64,

    /// Leader election lease duration in seconds
    #[arg(long, env = "LEASE_DURATION_SECS", default_value_t = DEFAULT_LEASE_DURATION_SECS)]
    pub lease_duration_secs: u64,

    /// Maximum number of concurrent Ingress status updates
    #[arg(long, env = "MAX_CONCURRENT_UPDATES", default_value_t = MAX_CONCURRENT_STATUS_UPDATES)]
    pub max_concurrent_updates: usize,

    /// Port of the metrics and health HTTP server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Publish node external addresses instead of internal ones
    #[arg(long, env = "PUBLISH_EXTERNAL_IP", default_value_t = false)]
    pub publish_external_ip: bool,
}

/// Validated configuration of the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Prefix of the leader election lock name
    pub election_id: String,
    /// Class assumed for Ingresses without a class when this controller runs the default class
    pub default_ingress_class: String,
    /// Class override; `None` means the default class
    pub ingress_class: Option<String>,
    /// Period of the reconcile ticker
    pub update_interval: Duration,
    /// Lease duration `T` of the leadership lock
    pub lease_duration: Duration,
    /// Bound on in-flight status updates per cycle
    pub max_concurrent_updates: usize,
    /// Port of the metrics/health server
    pub metrics_port: u16,
    /// Prefer node `InternalIP` addresses when publishing
    pub prefer_internal_ip: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            election_id: DEFAULT_ELECTION_ID.to_string(),
            default_ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
            ingress_class: None,
            update_interval: Duration::from_secs(UPDATE_INTERVAL_SECS),
            lease_duration: Duration::from_secs(DEFAULT_LEASE_DURATION_SECS),
            max_concurrent_updates: MAX_CONCURRENT_STATUS_UPDATES,
            metrics_port: METRICS_SERVER_PORT,
            prefer_internal_ip: true,
        }
    }
}

impl SyncConfig {
    /// Check invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::InvalidConfig`] if:
    /// - the election id or default class is empty
    /// - the update interval or lease duration is zero
    /// - the concurrency bound is zero
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.election_id.trim().is_empty() {
            return Err(StartupError::InvalidConfig(
                "election id cannot be empty".to_string(),
            ));
        }
        if self.default_ingress_class.trim().is_empty() {
            return Err(StartupError::InvalidConfig(
                "default ingress class cannot be empty".to_string(),
            ));
        }
        if self.update_interval.is_zero() {
            return Err(StartupError::InvalidConfig(
                "update interval must be greater than zero".to_string(),
            ));
        }
        if self.lease_duration.as_secs() < LEASE_RETRY_PERIOD_DIVISOR {
            return Err(StartupError::InvalidConfig(format!(
                "lease duration must be at least {LEASE_RETRY_PERIOD_DIVISOR} seconds"
            )));
        }
        if self.max_concurrent_updates == 0 {
            return Err(StartupError::InvalidConfig(
                "max concurrent updates must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Ingress class this instance handles: the override if set, else the default.
    #[must_use]
    pub fn effective_ingress_class(&self) -> &str {
        match self.ingress_class.as_deref() {
            Some(class) if !class.is_empty() => class,
            _ => &self.default_ingress_class,
        }
    }

    /// Name of the leadership lock: `<election-id>-<class>`.
    ///
    /// Including the class lets independent controller deployments in one
    /// cluster each hold their own leadership.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!("{}-{}", self.election_id, self.effective_ingress_class())
    }

    /// Time before the lease expires at which renewal is attempted (`T/2`).
    #[must_use]
    pub fn renew_deadline(&self) -> Duration {
        self.lease_duration / LEASE_RENEW_DEADLINE_DIVISOR as u32
    }

    /// Period at which the current lease holder is observed (`T/4`).
    #[must_use]
    pub fn retry_period(&self) -> Duration {
        self.lease_duration / LEASE_RETRY_PERIOD_DIVISOR as u32
    }
}

impl From<Cli> for SyncConfig {
    fn from(cli: Cli) -> Self {
        Self {
            election_id: cli.election_id,
            default_ingress_class: cli.default_ingress_class,
            ingress_class: cli.ingress_class.filter(|class| !class.is_empty()),
            update_interval: Duration::from_secs(cli.update_interval_secs),
            lease_duration: Duration::from_secs(cli.lease_duration_secs),
            max_concurrent_updates: cli.max_concurrent_updates,
            metrics_port: cli.metrics_port,
            prefer_internal_ip: !cli.publish_external_ip,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
