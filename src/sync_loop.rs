// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader-gated periodic reconcile loop.
//!
//! # States
//!
//! ```text
//!            started leading            drain
//!   Idle ───────────────────▶ Leading ─────────▶ Draining
//!    ▲                           │
//!    └───────────────────────────┘
//!            stopped leading
//! ```
//!
//! Each leadership term owns two tasks:
//! - a ticker firing the coalescing [`SyncTrigger`] every update interval,
//!   starting immediately
//! - a single worker consuming trigger events and running one cycle at a time
//!
//! Leaving a term (leadership lost or drain) cancels not-yet-started update
//! tasks, aborts the ticker and joins the worker, so no task of a previous term
//! survives into the next one.

use crate::address::{canonicalize, display_records};
use crate::cancel::{CancelSignal, Cancellation};
use crate::errors::DiscoveryError;
use crate::leader::LeaderCallbacks;
use crate::metrics::{record_published_addresses, record_sync_cycle};
use crate::probe::AddressProbe;
use crate::store::IngressLister;
use crate::trigger::{sync_trigger, FireOutcome, SyncTrigger, TriggerEvents};
use crate::updater::{StatusUpdater, UpdateSummary};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the [`ReconcileLoop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Not leading; no background tasks
    Idle,
    /// Leading; ticker and worker running
    Leading,
    /// Process is shutting down; leadership is ignored from now on
    Draining,
}

/// One discover → canonicalize → apply pass.
pub struct CycleRunner {
    probe: AddressProbe,
    lister: Arc<dyn IngressLister>,
    updater: StatusUpdater,
}

impl CycleRunner {
    #[must_use]
    pub fn new(probe: AddressProbe, lister: Arc<dyn IngressLister>, updater: StatusUpdater) -> Self {
        Self {
            probe,
            lister,
            updater,
        }
    }

    /// Run a full cycle against the current Ingress snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the replica addresses cannot be listed; no
    /// Ingress is touched in that case.
    pub async fn run_cycle(&self, cancel: &CancelSignal) -> Result<UpdateSummary, DiscoveryError> {
        let started = Instant::now();

        let addresses = match self.probe.discover().await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(error = %e, "Error obtaining list of running addresses, retrying on next tick");
                record_sync_cycle("discovery_error", started.elapsed());
                return Err(e);
            }
        };

        let desired = canonicalize(addresses);
        record_published_addresses(desired.len());
        debug!(addresses = %display_records(&desired), "Syncing Ingress status");

        let ingresses = self.lister.list();
        let summary = self.updater.apply(&desired, &ingresses, cancel).await;

        let outcome = if summary.failed() > 0 {
            "partial_failure"
        } else {
            "success"
        };
        record_sync_cycle(outcome, started.elapsed());
        Ok(summary)
    }
}

struct LeadershipTerm {
    trigger: SyncTrigger,
    stop: Cancellation,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

struct Inner {
    state: LoopState,
    term: Option<LeadershipTerm>,
}

/// Drives reconcile cycles while this process leads.
pub struct ReconcileLoop {
    runner: Arc<CycleRunner>,
    interval: Duration,
    inner: Mutex<Inner>,
}

impl ReconcileLoop {
    /// Create an idle loop that runs `runner` every `interval` while leading.
    #[must_use]
    pub fn new(runner: CycleRunner, interval: Duration) -> Self {
        Self {
            runner: Arc::new(runner),
            interval,
            inner: Mutex::new(Inner {
                state: LoopState::Idle,
                term: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.lock().state
    }

    /// Enter a leadership term: spawn the ticker and the worker.
    pub async fn start_leading(&self) {
        // A term left over from a missed stop notification is ended first.
        let previous = self.lock().term.take();
        if let Some(term) = previous {
            warn!("Leadership acquired while a previous term was still running, stopping it");
            end_term(term).await;
        }

        let mut inner = self.lock();
        if inner.state == LoopState::Draining {
            info!("Ignoring leadership while shutting down");
            return;
        }

        let (trigger, events) = sync_trigger();
        let stop = Cancellation::new();
        let ticker = tokio::spawn(run_ticker(trigger.clone(), self.interval, stop.signal()));
        let worker = tokio::spawn(run_worker(self.runner.clone(), events, stop.signal()));

        inner.term = Some(LeadershipTerm {
            trigger,
            stop,
            ticker,
            worker,
        });
        inner.state = LoopState::Leading;
        info!(interval_secs = self.interval.as_secs(), "Starting periodic Ingress status sync");
    }

    /// Leave the current leadership term and wait for its tasks to stop.
    pub async fn stop_leading(&self) {
        let term = {
            let mut inner = self.lock();
            if inner.state == LoopState::Leading {
                inner.state = LoopState::Idle;
            }
            inner.term.take()
        };
        if let Some(term) = term {
            info!("Stopping periodic Ingress status sync");
            end_term(term).await;
        }
    }

    /// Stop for good: no new events are accepted and later leadership is ignored.
    ///
    /// A cycle already running finishes its in-flight writes before this returns.
    pub async fn drain(&self) {
        let term = {
            let mut inner = self.lock();
            inner.state = LoopState::Draining;
            inner.term.take()
        };
        if let Some(term) = term {
            info!("Draining Ingress status sync");
            end_term(term).await;
        }
    }
}

#[async_trait]
impl LeaderCallbacks for ReconcileLoop {
    async fn on_started_leading(&self) {
        self.start_leading().await;
    }

    async fn on_stopped_leading(&self) {
        self.stop_leading().await;
    }

    fn on_new_leader(&self, identity: &str) {
        info!(leader = %identity, "Observed status update leader");
    }
}

async fn end_term(term: LeadershipTerm) {
    term.trigger.close();
    term.stop.cancel();
    term.ticker.abort();
    if let Err(e) = term.ticker.await {
        if !e.is_cancelled() {
            error!(error = %e, "Status sync ticker failed");
        }
    }
    if let Err(e) = term.worker.await {
        error!(error = %e, "Status sync worker failed");
    }
}

async fn run_ticker(trigger: SyncTrigger, period: Duration, mut stop: CancelSignal) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticks.tick() => {
                if trigger.fire() == FireOutcome::Coalesced {
                    debug!("Previous status sync still pending, coalescing tick");
                }
            }
        }
    }
}

async fn run_worker(runner: Arc<CycleRunner>, mut events: TriggerEvents, mut stop: CancelSignal) {
    loop {
        let key = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            event = events.next() => match event {
                Some(key) => key,
                None => break,
            },
        };

        debug!(key = %key, "Processing status sync event");
        // Discovery errors are logged by the runner; the next tick retries.
        let _ = runner.run_cycle(&stop).await;
    }
    debug!("Status sync worker stopped");
}

#[cfg(test)]
#[path = "sync_loop_tests.rs"]
mod sync_loop_tests;
