// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Public entry point of the synchronizer.
//!
//! [`StatusSync`] ties the leader elector to the reconcile loop and runs the
//! shutdown path on termination:
//!
//! ```text
//! run()       ── LeaderElector ──▶ ReconcileLoop (while leading)
//!                                     └─▶ AddressProbe ─▶ StatusUpdater
//! shutdown()  ── drain loop ─▶ ShutdownCoordinator ─▶ stop elector
//! ```

use crate::cancel::Cancellation;
use crate::class::EligibilityValidator;
use crate::config::SyncConfig;
use crate::errors::LeaderElectionError;
use crate::leader::{LeaderCallbacks, LeaderElector};
use crate::probe::{AddressProbe, NodeAddressResolver, PodInventory, ReplicaGuard};
use crate::shutdown::{ShutdownCoordinator, ShutdownDecision};
use crate::store::{IngressLister, IngressStatusClient};
use crate::sync_loop::{CycleRunner, LoopState, ReconcileLoop};
use crate::updater::StatusUpdater;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// External capabilities the synchronizer is built from.
pub struct Collaborators {
    /// Lists this controller's own pods
    pub pods: Arc<dyn PodInventory>,
    /// Maps a node to its published address
    pub nodes: Arc<dyn NodeAddressResolver>,
    /// Snapshot of all Ingresses
    pub lister: Arc<dyn IngressLister>,
    /// Per-Ingress reads and status writes
    pub client: Arc<dyn IngressStatusClient>,
    /// Decides which Ingresses belong to this controller
    pub validator: Arc<dyn EligibilityValidator>,
    /// Cluster-wide leadership
    pub elector: Arc<dyn LeaderElector>,
}

/// Keeps Ingress status in line with the addresses of the running replicas.
pub struct StatusSync {
    elector: Arc<dyn LeaderElector>,
    sync_loop: Arc<ReconcileLoop>,
    coordinator: ShutdownCoordinator,
    stop: Cancellation,
    shut_down: AtomicBool,
}

impl StatusSync {
    /// Wire the synchronizer from its collaborators.
    #[must_use]
    pub fn new(config: &SyncConfig, parts: Collaborators) -> Self {
        let probe = AddressProbe::new(parts.pods.clone(), parts.nodes, config.prefer_internal_ip);
        let guard = ReplicaGuard::new(parts.pods);
        let updater = StatusUpdater::new(
            parts.client,
            parts.validator,
            config.max_concurrent_updates,
        );
        debug!(
            max_concurrent = updater.max_concurrent(),
            update_interval_secs = config.update_interval.as_secs(),
            "Configured Ingress status updater"
        );

        let runner = CycleRunner::new(probe.clone(), parts.lister.clone(), updater.clone());
        let sync_loop = Arc::new(ReconcileLoop::new(runner, config.update_interval));
        let coordinator = ShutdownCoordinator::new(probe, guard, parts.lister, updater);

        Self {
            elector: parts.elector,
            sync_loop,
            coordinator,
            stop: Cancellation::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Take part in leader election and reconcile while leading.
    ///
    /// Returns once [`StatusSync::shutdown`] has completed.
    ///
    /// # Errors
    ///
    /// Returns [`LeaderElectionError`] if the election cannot be started.
    pub async fn run(&self) -> Result<(), LeaderElectionError> {
        info!("Starting Ingress status sync");
        let callbacks: Arc<dyn LeaderCallbacks> = self.sync_loop.clone();
        let result = self.elector.run(callbacks, self.stop.signal()).await;

        // The elector may return on its own; never leave a term running.
        self.sync_loop.drain().await;
        debug!("Ingress status sync stopped");
        result
    }

    /// Stop reconciling and clear published addresses if this is the last replica.
    ///
    /// Runs at most once; later calls return `None`.
    pub async fn shutdown(&self) -> Option<ShutdownDecision> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return None;
        }

        info!("Shutting down Ingress status sync");
        self.sync_loop.drain().await;

        // Leadership is still held here, so the coordinator's writes are safe.
        let decision = self.coordinator.run(self.elector.is_leader()).await;
        info!(decision = ?decision, "Ingress status shutdown complete");

        self.stop.cancel();
        Some(decision)
    }

    /// Whether this process currently leads.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.elector.is_leader()
    }

    /// Current state of the reconcile loop.
    #[must_use]
    pub fn loop_state(&self) -> LoopState {
        self.sync_loop.state()
    }
}

#[cfg(test)]
#[path = "status_sync_tests.rs"]
mod status_sync_tests;
