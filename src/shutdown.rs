// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Decides what happens to published addresses when the process terminates.
//!
//! Only the last replica leaving clears the Ingress status. Whenever another
//! replica might still serve traffic the status is left alone; the next leader
//! reconciles it on its first tick.

use crate::cancel::CancelSignal;
use crate::probe::{AddressProbe, ReplicaGuard};
use crate::store::IngressLister;
use crate::updater::{StatusUpdater, UpdateSummary};
use std::sync::Arc;
use tracing::{error, info};

/// Branch taken by [`ShutdownCoordinator::run`].
#[derive(Debug)]
pub enum ShutdownDecision {
    /// This process was not leading; nothing to do
    NotLeader,
    /// Addresses could not be discovered; nothing written
    DiscoveryFailed,
    /// More than one address is published; left for the next leader
    LeftForNextLeader {
        /// Number of addresses discovered
        addresses: usize,
    },
    /// Other replicas are running and one of them will take over
    OtherReplicasRunning,
    /// This was the last replica; status was cleared
    Cleared(UpdateSummary),
}

impl ShutdownDecision {
    /// Whether Ingress status was written as part of shutdown.
    #[must_use]
    pub fn cleared(&self) -> bool {
        matches!(self, ShutdownDecision::Cleared(_))
    }
}

/// Runs the termination path once the reconcile loop has stopped.
pub struct ShutdownCoordinator {
    probe: AddressProbe,
    guard: ReplicaGuard,
    lister: Arc<dyn IngressLister>,
    updater: StatusUpdater,
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new(
        probe: AddressProbe,
        guard: ReplicaGuard,
        lister: Arc<dyn IngressLister>,
        updater: StatusUpdater,
    ) -> Self {
        Self {
            probe,
            guard,
            lister,
            updater,
        }
    }

    /// Clear published addresses if, and only if, this is the last replica leaving.
    pub async fn run(&self, is_leader: bool) -> ShutdownDecision {
        if !is_leader {
            return ShutdownDecision::NotLeader;
        }

        info!("Updating status of Ingress rules (remove)");

        let addresses = match self.probe.discover().await {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(error = %e, "Error obtaining running addresses, leaving Ingress status untouched");
                return ShutdownDecision::DiscoveryFailed;
            }
        };

        if addresses.len() > 1 {
            info!(
                addresses = addresses.len(),
                "Leaving status update for next leader"
            );
            return ShutdownDecision::LeftForNextLeader {
                addresses: addresses.len(),
            };
        }

        if self.guard.has_multiple_replicas().await {
            info!("Skipping Ingress status update (multiple pods running - another one will be elected as master)");
            return ShutdownDecision::OtherReplicasRunning;
        }

        info!("Removing address from Ingress status");
        let ingresses = self.lister.list();
        let summary = self
            .updater
            .apply(&[], &ingresses, &CancelSignal::never())
            .await;
        ShutdownDecision::Cleared(summary)
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod shutdown_tests;
