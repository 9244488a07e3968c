// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the status synchronizer.
//!
//! Errors are split by how far they are allowed to propagate:
//! - [`DiscoveryError`] aborts a single reconcile cycle; the next tick retries
//! - [`UpdateError`] belongs to one Ingress and never leaves its update task
//! - [`StartupError`] is fatal; the process cannot hold a well-formed leadership identity
//! - [`LeaderElectionError`] is logged by the elector loop and is never fatal after startup

use thiserror::Error;

/// Failure to enumerate the addresses this controller is running on.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Listing the controller's own pods failed
    #[error("failed to list controller pods in namespace '{namespace}' with selector '{selector}': {source}")]
    PodListFailed {
        /// Namespace the pods were listed in
        namespace: String,
        /// Label selector derived from the controller's own pod
        selector: String,
        /// Underlying API error
        #[source]
        source: kube::Error,
    },
}

/// Failure while updating the status of a single Ingress.
///
/// These errors are collected per task by the updater and are never escalated
/// to the surrounding batch.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Re-fetching the latest revision of the Ingress failed
    #[error("unexpected error searching Ingress {namespace}/{name}: {source}")]
    Fetch {
        /// Namespace of the Ingress
        namespace: String,
        /// Name of the Ingress
        name: String,
        /// Underlying API error
        #[source]
        source: kube::Error,
    },

    /// Writing the status subresource failed (including optimistic-concurrency conflicts)
    #[error("error updating status of Ingress {namespace}/{name}: {source}")]
    Write {
        /// Namespace of the Ingress
        namespace: String,
        /// Name of the Ingress
        name: String,
        /// Underlying API error
        #[source]
        source: kube::Error,
    },

    /// The update task panicked or was aborted before reporting back
    #[error("status update task for Ingress {namespace}/{name} did not complete: {reason}")]
    TaskAborted {
        /// Namespace of the Ingress
        namespace: String,
        /// Name of the Ingress
        name: String,
        /// Join error description
        reason: String,
    },
}

impl UpdateError {
    /// `(namespace, name)` of the Ingress this error belongs to.
    #[must_use]
    pub fn resource(&self) -> (&str, &str) {
        match self {
            UpdateError::Fetch {
                namespace, name, ..
            }
            | UpdateError::Write {
                namespace, name, ..
            }
            | UpdateError::TaskAborted {
                namespace, name, ..
            } => (namespace, name),
        }
    }

    /// Whether the write was rejected because the Ingress changed since it was fetched.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            UpdateError::Write {
                source: kube::Error::Api(api_err),
                ..
            } if api_err.code == 409
        )
    }
}

/// Unrecoverable errors raised while constructing the synchronizer.
#[derive(Error, Debug)]
pub enum StartupError {
    /// A required environment variable describing this pod is missing
    #[error("environment variable {0} is not set; it must be provided through the downward API")]
    MissingEnv(&'static str),

    /// Reading this controller's own Pod object failed
    #[error("unable to get POD information for {namespace}/{name}: {source}")]
    PodLookup {
        /// Namespace of this pod
        namespace: String,
        /// Name of this pod
        name: String,
        /// Underlying API error
        #[source]
        source: kube::Error,
    },

    /// This controller's Pod carries no labels, so its replicas cannot be selected
    #[error("pod {namespace}/{name} has no labels; cannot select controller replicas")]
    NoPodLabels {
        /// Namespace of this pod
        namespace: String,
        /// Name of this pod
        name: String,
    },

    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The leadership primitive could not be constructed
    #[error("unexpected error starting leader election for lock '{lock_name}': {reason}")]
    LeaderElection {
        /// Name of the lease used as the leadership lock
        lock_name: String,
        /// Description of the underlying failure
        reason: String,
    },

    /// The Kubernetes client could not be constructed
    #[error("failed to initialize Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Errors raised by the leadership primitive once it is running.
#[derive(Error, Debug)]
pub enum LeaderElectionError {
    /// `run` was invoked more than once on the same elector
    #[error("leader elector for lock '{0}' is already running")]
    AlreadyRunning(String),

    /// The lease manager task ended with an error
    #[error("lease manager for lock '{lock_name}' failed: {reason}")]
    LeaseManager {
        /// Name of the lease used as the leadership lock
        lock_name: String,
        /// Description of the underlying failure
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
