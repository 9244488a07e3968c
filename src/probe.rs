// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Discovery of the addresses this controller is reachable at.
//!
//! Every replica of the controller runs on some node; the node's preferred
//! address is what gets published in Ingress status. [`AddressProbe`] turns the
//! current replica snapshot into that address list and [`ReplicaGuard`] answers
//! whether more than one replica is running.
//!
//! Neither caches anything: each call lists the pods again.

use crate::errors::DiscoveryError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// One replica of this controller as seen in the pod listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaPod {
    /// Pod name
    pub name: String,
    /// Node hosting the pod; `None` while the pod is unscheduled
    pub node_name: Option<String>,
}

/// Lists the pods that make up this controller deployment.
#[async_trait]
pub trait PodInventory: Send + Sync {
    /// All pods matching the controller's own label selector in its namespace.
    async fn list_replicas(&self) -> Result<Vec<ReplicaPod>, DiscoveryError>;
}

/// Resolves a node to the single address published for it.
#[async_trait]
pub trait NodeAddressResolver: Send + Sync {
    /// Preferred address of `node`. Implementations fall back to the node name
    /// when no address is known.
    async fn resolve(&self, node: &str, prefer_internal: bool) -> String;
}

/// Discovers the set of addresses where controller replicas are reachable.
#[derive(Clone)]
pub struct AddressProbe {
    pods: Arc<dyn PodInventory>,
    nodes: Arc<dyn NodeAddressResolver>,
    prefer_internal: bool,
}

impl AddressProbe {
    /// Create a probe over the given pod inventory and node resolver.
    #[must_use]
    pub fn new(
        pods: Arc<dyn PodInventory>,
        nodes: Arc<dyn NodeAddressResolver>,
        prefer_internal: bool,
    ) -> Self {
        Self {
            pods,
            nodes,
            prefer_internal,
        }
    }

    /// Addresses of all nodes currently hosting a replica, without duplicates.
    ///
    /// Order follows the pod listing; callers canonicalize before comparing.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the pod listing fails. The failure is
    /// transient from the caller's perspective: the current cycle is abandoned
    /// and the next tick retries.
    pub async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let replicas = self.pods.list_replicas().await?;
        let mut addresses: Vec<String> = Vec::with_capacity(replicas.len());

        for replica in &replicas {
            let Some(node) = replica.node_name.as_deref().filter(|n| !n.is_empty()) else {
                debug!(pod = %replica.name, "Skipping replica not yet scheduled to a node");
                continue;
            };

            let address = self.nodes.resolve(node, self.prefer_internal).await;
            if address.is_empty() {
                warn!(pod = %replica.name, node = %node, "Node resolved to an empty address");
                continue;
            }
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }

        debug!(
            replicas = replicas.len(),
            addresses = ?addresses,
            "Discovered running addresses"
        );
        Ok(addresses)
    }
}

/// Answers whether more than one replica of the controller is running.
#[derive(Clone)]
pub struct ReplicaGuard {
    pods: Arc<dyn PodInventory>,
}

impl ReplicaGuard {
    /// Create a guard over the same pod inventory the probe uses.
    #[must_use]
    pub fn new(pods: Arc<dyn PodInventory>) -> Self {
        Self { pods }
    }

    /// `true` if the pod listing contains more than one replica.
    ///
    /// A listing error yields `false`. This is fail-open: during an API outage a
    /// leaving leader may conclude it is alone and clear the published status.
    pub async fn has_multiple_replicas(&self) -> bool {
        match self.pods.list_replicas().await {
            Ok(replicas) => replicas.len() > 1,
            Err(e) => {
                warn!(
                    error = %e,
                    "Cannot confirm replica count, assuming no other replicas are running"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod probe_tests;
