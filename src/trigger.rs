// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Coalescing trigger for reconcile cycles.
//!
//! The trigger is a single-slot mailbox. Firing while an event is already
//! pending is absorbed, so a slow cycle never builds up a backlog: at most one
//! event waits while another cycle runs.

use crate::constants::SYNC_TRIGGER_KEY;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// What happened to a [`SyncTrigger::fire`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireOutcome {
    /// The event now occupies the pending slot
    Queued,
    /// An event was already pending; this one was merged into it
    Coalesced,
    /// The trigger was closed; the event was dropped
    Rejected,
}

/// Producer side of the coalescing trigger. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SyncTrigger {
    tx: mpsc::Sender<&'static str>,
    closed: Arc<AtomicBool>,
}

/// Consumer side of the coalescing trigger.
#[derive(Debug)]
pub struct TriggerEvents {
    rx: mpsc::Receiver<&'static str>,
}

/// Create a connected trigger/receiver pair with a single pending slot.
#[must_use]
pub fn sync_trigger() -> (SyncTrigger, TriggerEvents) {
    let (tx, rx) = mpsc::channel(1);
    (
        SyncTrigger {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        },
        TriggerEvents { rx },
    )
}

impl SyncTrigger {
    /// Request a reconcile cycle.
    pub fn fire(&self) -> FireOutcome {
        if self.is_closed() {
            return FireOutcome::Rejected;
        }
        match self.tx.try_send(SYNC_TRIGGER_KEY) {
            Ok(()) => FireOutcome::Queued,
            Err(TrySendError::Full(_)) => FireOutcome::Coalesced,
            Err(TrySendError::Closed(_)) => FireOutcome::Rejected,
        }
    }

    /// Stop accepting events. Events already pending stay in the slot.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`SyncTrigger::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl TriggerEvents {
    /// Wait for the next event. `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<&'static str> {
        self.rx.recv().await
    }
}
