// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded, failure-isolated fan-out of Ingress status updates.
//!
//! [`StatusUpdater::apply`] schedules one task per eligible Ingress. At most
//! `max_concurrent` tasks run at once (semaphore), and the call returns only
//! after every task finished (fan-in barrier).
//!
//! Each task:
//! 1. checks the cancellation signal once, before doing any work
//! 2. compares the desired addresses with the recorded status in canonical order
//! 3. skips the write if they are equal
//! 4. otherwise re-fetches the latest revision, replaces the status and writes it
//!    back conditionally on that revision
//!
//! A failure is logged and counted for its own Ingress only; the rest of the
//! batch is neither aborted nor retried.

use crate::address::{
    addresses_equal, display_records, records_from_status, records_to_status, sort_canonical,
    AddressRecord,
};
use crate::cancel::CancelSignal;
use crate::class::EligibilityValidator;
use crate::errors::UpdateError;
use crate::metrics::record_status_updates;
use crate::store::IngressStatusClient;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of a single per-Ingress task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Status was rewritten
    Updated,
    /// Status already matched; no write issued
    Unchanged,
    /// Task observed cancellation at start and did nothing
    Cancelled,
}

/// Aggregated result of one [`StatusUpdater::apply`] call.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    /// Ingresses whose status was written
    pub updated: usize,
    /// Ingresses already up to date
    pub unchanged: usize,
    /// Tasks that did not start because of cancellation
    pub cancelled: usize,
    /// Ingresses skipped by the eligibility validator
    pub ineligible: usize,
    /// Per-Ingress failures, isolated from each other
    pub failures: Vec<UpdateError>,
}

impl UpdateSummary {
    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failures caused by the Ingress changing between fetch and write.
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.failures.iter().filter(|e| e.is_conflict()).count()
    }

    /// Number of tasks scheduled (eligible Ingresses).
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.updated + self.unchanged + self.cancelled + self.failed()
    }

    fn record(&mut self, result: Result<UpdateOutcome, UpdateError>) {
        match result {
            Ok(UpdateOutcome::Updated) => self.updated += 1,
            Ok(UpdateOutcome::Unchanged) => self.unchanged += 1,
            Ok(UpdateOutcome::Cancelled) => self.cancelled += 1,
            Err(e) => self.failures.push(e),
        }
    }
}

/// Applies a desired address list to every eligible Ingress.
#[derive(Clone)]
pub struct StatusUpdater {
    client: Arc<dyn IngressStatusClient>,
    validator: Arc<dyn EligibilityValidator>,
    max_concurrent: usize,
}

impl StatusUpdater {
    /// Create an updater with the given concurrency bound (minimum 1).
    #[must_use]
    pub fn new(
        client: Arc<dyn IngressStatusClient>,
        validator: Arc<dyn EligibilityValidator>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            validator,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Concurrency bound of this updater.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Apply `desired` to every eligible Ingress in `ingresses` and wait for all tasks.
    pub async fn apply(
        &self,
        desired: &[AddressRecord],
        ingresses: &[Arc<Ingress>],
        cancel: &CancelSignal,
    ) -> UpdateSummary {
        let mut desired = desired.to_vec();
        sort_canonical(&mut desired);
        let desired = Arc::new(desired);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut summary = UpdateSummary::default();
        let mut tasks = Vec::with_capacity(ingresses.len());

        for ingress in ingresses {
            if !self.validator.is_eligible(ingress) {
                summary.ineligible += 1;
                continue;
            }

            let namespace = ingress.namespace().unwrap_or_default();
            let name = ingress.name_any();
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let ingress = ingress.clone();
            let desired = desired.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Ok(UpdateOutcome::Cancelled);
                };
                if cancel.is_cancelled() {
                    return Ok(UpdateOutcome::Cancelled);
                }
                update_ingress(client.as_ref(), &ingress, &desired).await
            });

            tasks.push((namespace, name, handle));
        }

        let (ids, handles): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .map(|(namespace, name, handle)| ((namespace, name), handle))
            .unzip();
        let results = futures::future::join_all(handles).await;

        for ((namespace, name), joined) in ids.into_iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                Err(UpdateError::TaskAborted {
                    namespace,
                    name,
                    reason: e.to_string(),
                })
            });
            if let Err(e) = &result {
                let (namespace, name) = e.resource();
                if e.is_conflict() {
                    info!(
                        namespace = %namespace,
                        name = %name,
                        "Ingress changed while updating its status, next cycle retries"
                    );
                } else {
                    warn!(namespace = %namespace, name = %name, error = %e, "Ingress status update failed");
                }
            }
            summary.record(result);
        }

        record_status_updates("updated", summary.updated);
        record_status_updates("unchanged", summary.unchanged);
        record_status_updates("cancelled", summary.cancelled);
        record_status_updates("conflict", summary.conflicts());
        record_status_updates("failed", summary.failed() - summary.conflicts());

        debug!(
            scheduled = summary.scheduled(),
            updated = summary.updated,
            unchanged = summary.unchanged,
            cancelled = summary.cancelled,
            failed = summary.failed(),
            ineligible = summary.ineligible,
            "Ingress status batch complete"
        );
        summary
    }
}

/// Bring one Ingress' status in line with `desired` (already canonical).
async fn update_ingress(
    client: &dyn IngressStatusClient,
    ingress: &Ingress,
    desired: &[AddressRecord],
) -> Result<UpdateOutcome, UpdateError> {
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    let mut current = records_from_status(
        ingress
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref()),
    );
    sort_canonical(&mut current);

    if addresses_equal(desired, &current) {
        debug!(namespace = %namespace, name = %name, "Skipping update of Ingress (no change)");
        return Ok(UpdateOutcome::Unchanged);
    }

    let mut latest = client
        .get(&namespace, &name)
        .await
        .map_err(|source| UpdateError::Fetch {
            namespace: namespace.clone(),
            name: name.clone(),
            source,
        })?;

    info!(
        namespace = %namespace,
        name = %name,
        addresses = %display_records(desired),
        "Updating Ingress status"
    );
    latest.status.get_or_insert_with(Default::default).load_balancer =
        Some(records_to_status(desired));

    client
        .update_status(&latest)
        .await
        .map_err(|source| UpdateError::Write {
            namespace,
            name,
            source,
        })?;

    Ok(UpdateOutcome::Updated)
}

#[cfg(test)]
#[path = "updater_tests.rs"]
mod updater_tests;
