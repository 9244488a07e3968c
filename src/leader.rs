// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader election for the status synchronizer.
//!
//! Only the leader writes Ingress status. The synchronizer depends on the
//! [`LeaderElector`] trait; [`LeaseElector`] implements it with a Kubernetes
//! `Lease` through `kube-lease-manager`.
//!
//! # Lease timing
//!
//! With lease duration `T`:
//! - renewal happens `T/2` before expiry
//! - the current lease holder is observed every `T/4`
//!
//! Two replicas can both believe they lead for at most about `T`.

use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::errors::{LeaderElectionError, StartupError};
use crate::metrics::{record_leader_elected, record_leader_lost, record_leader_observed};
use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use kube::{Api, Client};
use kube_lease_manager::LeaseManagerBuilder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Notifications delivered by a [`LeaderElector`].
#[async_trait]
pub trait LeaderCallbacks: Send + Sync {
    /// This process acquired leadership.
    async fn on_started_leading(&self);

    /// This process lost leadership. Must not return before background work
    /// started in [`LeaderCallbacks::on_started_leading`] has stopped.
    async fn on_stopped_leading(&self);

    /// A (possibly different) process was observed holding the lock.
    fn on_new_leader(&self, identity: &str);
}

/// Cluster-wide mutual exclusion between controller replicas.
#[async_trait]
pub trait LeaderElector: Send + Sync {
    /// Take part in the election until `shutdown` fires, delivering callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`LeaderElectionError`] if the election cannot be started.
    async fn run(
        &self,
        callbacks: Arc<dyn LeaderCallbacks>,
        shutdown: CancelSignal,
    ) -> Result<(), LeaderElectionError>;

    /// Whether this process holds leadership right now.
    fn is_leader(&self) -> bool;
}

/// Current leadership of this process.
#[derive(Debug, Default)]
pub struct LeadershipFlag(AtomicBool);

impl LeadershipFlag {
    /// `true` while leading.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Record the new state; returns `true` if it changed.
    pub fn set(&self, leading: bool) -> bool {
        self.0.swap(leading, Ordering::SeqCst) != leading
    }
}

/// Remembers the last observed lease holder.
#[derive(Debug, Default)]
pub struct HolderTracker {
    last: Mutex<Option<String>>,
}

impl HolderTracker {
    /// Feed the holder currently recorded in the lease. Returns the holder if
    /// it differs from the previous observation.
    pub fn observe(&self, holder: Option<&str>) -> Option<String> {
        let holder = holder.filter(|h| !h.is_empty())?;
        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if last.as_deref() == Some(holder) {
            return None;
        }
        *last = Some(holder.to_string());
        Some(holder.to_string())
    }
}

/// Holder identity recorded in a lease, if any.
#[must_use]
pub fn lease_holder(lease: &Lease) -> Option<&str> {
    lease
        .spec
        .as_ref()
        .and_then(|spec| spec.holder_identity.as_deref())
}

/// [`LeaderElector`] backed by a Kubernetes `Lease`.
pub struct LeaseElector {
    client: Client,
    lock_name: String,
    namespace: String,
    identity: String,
    lease_duration: Duration,
    renew_deadline: Duration,
    retry_period: Duration,
    leadership: LeadershipFlag,
    holders: HolderTracker,
    running: AtomicBool,
}

impl LeaseElector {
    /// Create an elector for the lock named by `config`, in `namespace`,
    /// campaigning as `identity` (the pod name).
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::LeaderElection`] if the lock name or identity is empty.
    pub fn new(
        client: Client,
        config: &SyncConfig,
        namespace: &str,
        identity: &str,
    ) -> Result<Self, StartupError> {
        let lock_name = config.lock_name();
        if identity.is_empty() || namespace.is_empty() {
            return Err(StartupError::LeaderElection {
                lock_name,
                reason: "identity and namespace must not be empty".to_string(),
            });
        }

        Ok(Self {
            client,
            lock_name,
            namespace: namespace.to_string(),
            identity: identity.to_string(),
            lease_duration: config.lease_duration,
            renew_deadline: config.renew_deadline(),
            retry_period: config.retry_period(),
            leadership: LeadershipFlag::default(),
            holders: HolderTracker::default(),
            running: AtomicBool::new(false),
        })
    }

    /// Name of the `Lease` this elector campaigns for.
    #[must_use]
    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    async fn transition(&self, leading: bool, callbacks: &dyn LeaderCallbacks) {
        if !self.leadership.set(leading) {
            return;
        }
        if leading {
            info!(identity = %self.identity, lock = %self.lock_name, "I am the new status update leader");
            record_leader_elected(&self.identity);
            callbacks.on_started_leading().await;
        } else {
            info!(identity = %self.identity, lock = %self.lock_name, "Stopped leading status updates");
            record_leader_lost(&self.identity);
            callbacks.on_stopped_leading().await;
        }
    }

    async fn observe_holder(&self, leases: &Api<Lease>, callbacks: &dyn LeaderCallbacks) {
        match leases.get_opt(&self.lock_name).await {
            Ok(Some(lease)) => {
                if let Some(holder) = self.holders.observe(lease_holder(&lease)) {
                    info!(leader = %holder, "New leader elected");
                    record_leader_observed();
                    callbacks.on_new_leader(&holder);
                }
            }
            Ok(None) => debug!(lock = %self.lock_name, "Leader election lease does not exist yet"),
            Err(e) => debug!(lock = %self.lock_name, error = %e, "Failed to read leader election lease"),
        }
    }
}

#[async_trait]
impl LeaderElector for LeaseElector {
    async fn run(
        &self,
        callbacks: Arc<dyn LeaderCallbacks>,
        mut shutdown: CancelSignal,
    ) -> Result<(), LeaderElectionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LeaderElectionError::AlreadyRunning(self.lock_name.clone()));
        }

        let manager = LeaseManagerBuilder::new(self.client.clone(), &self.lock_name)
            .with_namespace(&self.namespace)
            .with_identity(&self.identity)
            .with_duration(self.lease_duration.as_secs())
            .with_grace(self.renew_deadline.as_secs())
            .build()
            .await
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                LeaderElectionError::LeaseManager {
                    lock_name: self.lock_name.clone(),
                    reason: e.to_string(),
                }
            })?;

        info!(
            lock = %self.lock_name,
            namespace = %self.namespace,
            identity = %self.identity,
            lease_duration_secs = self.lease_duration.as_secs(),
            "Starting leader election"
        );

        let (mut leading, task) = manager.watch().await;
        let leases: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let mut observe = tokio::time::interval(self.retry_period);
        observe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = leading.changed() => {
                    if changed.is_err() {
                        warn!(lock = %self.lock_name, "Lease manager stopped unexpectedly");
                        break;
                    }
                    let is_leader = *leading.borrow_and_update();
                    self.transition(is_leader, callbacks.as_ref()).await;
                }
                _ = observe.tick() => {
                    self.observe_holder(&leases, callbacks.as_ref()).await;
                }
            }
        }

        self.transition(false, callbacks.as_ref()).await;

        // Closing the channel makes the manager release the lease and return.
        drop(leading);
        match task.await {
            Ok(Ok(_)) => info!(lock = %self.lock_name, "Released leader election lease"),
            Ok(Err(e)) => warn!(lock = %self.lock_name, error = %e, "Failed to release leader election lease"),
            Err(e) => error!(lock = %self.lock_name, error = %e, "Lease manager task panicked"),
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.leadership.is_leader()
    }
}

#[cfg(test)]
#[path = "leader_tests.rs"]
mod leader_tests;
