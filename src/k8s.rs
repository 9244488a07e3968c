// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes implementations of the synchronizer's collaborators.
//!
//! - [`PodInfo`] - identity and labels of the pod this process runs in
//! - [`KubePodInventory`] - replicas sharing this pod's labels
//! - [`KubeNodeResolver`] - node name to published address
//! - [`KubeIngressClient`] - Ingress reads and conditional status writes
//! - [`ReflectorIngressLister`] - watch-backed Ingress snapshot
//! - [`build_status_sync`] - wires all of them into a [`StatusSync`]

use crate::class::IngressClassFilter;
use crate::config::SyncConfig;
use crate::constants::{
    INGRESS_CACHE_SYNC_TIMEOUT_SECS, KIND_INGRESS, POD_NAMESPACE_ENV, POD_NAME_ENV,
};
use crate::errors::{DiscoveryError, StartupError};
use crate::labels::{NODE_EXTERNAL_IP, NODE_INTERNAL_IP};
use crate::leader::LeaseElector;
use crate::probe::{NodeAddressResolver, PodInventory, ReplicaPod};
use crate::status_sync::{Collaborators, StatusSync};
use crate::store::{IngressLister, IngressStatusClient};
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{ListParams, Patch, PatchParams},
    runtime::{reflector, reflector::Store, watcher, WatchStreamExt},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ============================================================================
// Pod identity
// ============================================================================

/// The pod this controller process runs in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    /// Labels of the pod; every replica of the deployment shares them
    pub labels: BTreeMap<String, String>,
}

/// Pod name and namespace from the given variable values.
///
/// # Errors
///
/// Returns [`StartupError::MissingEnv`] naming the first missing or empty variable.
pub fn pod_identity(
    name: Option<String>,
    namespace: Option<String>,
) -> Result<(String, String), StartupError> {
    let name = name
        .filter(|v| !v.is_empty())
        .ok_or(StartupError::MissingEnv(POD_NAME_ENV))?;
    let namespace = namespace
        .filter(|v| !v.is_empty())
        .ok_or(StartupError::MissingEnv(POD_NAMESPACE_ENV))?;
    Ok((name, namespace))
}

impl PodInfo {
    /// Read the pod identity from `POD_NAME`/`POD_NAMESPACE` and fetch the pod.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if a variable is missing, the pod cannot be
    /// read, or it carries no labels.
    pub async fn fetch(client: &Client) -> Result<Self, StartupError> {
        let (name, namespace) = pod_identity(
            std::env::var(POD_NAME_ENV).ok(),
            std::env::var(POD_NAMESPACE_ENV).ok(),
        )?;

        let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
        let pod = api
            .get(&name)
            .await
            .map_err(|source| StartupError::PodLookup {
                namespace: namespace.clone(),
                name: name.clone(),
                source,
            })?;

        Self::from_pod(&pod, &namespace)
    }

    /// Build from a fetched pod object.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::NoPodLabels`] if the pod has no labels, since
    /// an empty selector would match every pod in the namespace.
    pub fn from_pod(pod: &Pod, namespace: &str) -> Result<Self, StartupError> {
        let name = pod.name_any();
        let namespace = pod.namespace().unwrap_or_else(|| namespace.to_string());
        let labels = pod.labels().clone();
        if labels.is_empty() {
            return Err(StartupError::NoPodLabels { namespace, name });
        }
        Ok(Self {
            name,
            namespace,
            labels,
        })
    }

    /// Equality-based label selector matching all replicas, e.g. `app=ingress,tier=edge`.
    #[must_use]
    pub fn selector(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ============================================================================
// Replicas and nodes
// ============================================================================

/// Lists the pods sharing this pod's labels in its namespace.
pub struct KubePodInventory {
    api: Api<Pod>,
    namespace: String,
    selector: String,
}

impl KubePodInventory {
    #[must_use]
    pub fn new(client: Client, pod: &PodInfo) -> Self {
        Self {
            api: Api::namespaced(client, &pod.namespace),
            namespace: pod.namespace.clone(),
            selector: pod.selector(),
        }
    }
}

#[async_trait]
impl PodInventory for KubePodInventory {
    async fn list_replicas(&self) -> Result<Vec<ReplicaPod>, DiscoveryError> {
        let pods = self
            .api
            .list(&ListParams::default().labels(&self.selector))
            .await
            .map_err(|source| DiscoveryError::PodListFailed {
                namespace: self.namespace.clone(),
                selector: self.selector.clone(),
                source,
            })?;

        Ok(pods
            .items
            .iter()
            .map(|pod| ReplicaPod {
                name: pod.name_any(),
                node_name: pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
            })
            .collect())
    }
}

/// Address of `node` of the preferred type, falling back to the other type.
#[must_use]
pub fn node_address(node: &Node, prefer_internal: bool) -> Option<String> {
    let addresses = node.status.as_ref()?.addresses.as_ref()?;
    let order = if prefer_internal {
        [NODE_INTERNAL_IP, NODE_EXTERNAL_IP]
    } else {
        [NODE_EXTERNAL_IP, NODE_INTERNAL_IP]
    };

    order.iter().find_map(|kind| {
        addresses
            .iter()
            .find(|a| a.type_ == *kind && !a.address.is_empty())
            .map(|a| a.address.clone())
    })
}

/// Resolves nodes through the API, falling back to the node name.
pub struct KubeNodeResolver {
    api: Api<Node>,
}

impl KubeNodeResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeAddressResolver for KubeNodeResolver {
    async fn resolve(&self, node: &str, prefer_internal: bool) -> String {
        match self.api.get(node).await {
            Ok(obj) => node_address(&obj, prefer_internal).unwrap_or_else(|| {
                debug!(node = %node, "Node has no usable address, publishing its name");
                node.to_string()
            }),
            Err(e) => {
                warn!(node = %node, error = %e, "Error getting node, publishing its name");
                node.to_string()
            }
        }
    }
}

// ============================================================================
// Ingress access
// ============================================================================

/// Merge patch replacing `status` of `ingress`, conditional on its `resourceVersion`.
#[must_use]
pub fn status_patch(ingress: &Ingress) -> serde_json::Value {
    json!({
        "metadata": {
            "resourceVersion": ingress.resource_version(),
        },
        "status": ingress.status,
    })
}

/// Reads Ingresses and patches their status through the API server.
pub struct KubeIngressClient {
    client: Client,
}

impl KubeIngressClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IngressStatusClient for KubeIngressClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Ingress, kube::Error> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await
    }

    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, kube::Error> {
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);

        debug!(kind = KIND_INGRESS, namespace = %namespace, name = %name, "Patching status");
        api.patch_status(
            &name,
            &PatchParams::default(),
            &Patch::Merge(&status_patch(ingress)),
        )
        .await
    }
}

/// Ingress snapshot kept current by a cluster-wide watch.
#[derive(Clone)]
pub struct ReflectorIngressLister {
    store: Store<Ingress>,
}

impl ReflectorIngressLister {
    /// Start watching Ingresses in all namespaces.
    ///
    /// Returns the lister and the task driving the watch.
    #[must_use]
    pub fn start(client: Client) -> (Self, JoinHandle<()>) {
        let api: Api<Ingress> = Api::all(client);
        let (store, writer) = reflector::store();

        let task = tokio::spawn(async move {
            watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer)
                .applied_objects()
                .for_each(|event| async move {
                    if let Err(e) = event {
                        warn!(error = %e, "Ingress watch error");
                    }
                })
                .await;
        });

        (Self { store }, task)
    }

    /// Wait until the first full listing has been received, up to `timeout`.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.store.wait_until_ready()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Ingress cache writer dropped before first listing");
                false
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Ingress cache not ready yet, first sync may see a partial list"
                );
                false
            }
        }
    }
}

impl IngressLister for ReflectorIngressLister {
    fn list(&self) -> Vec<Arc<Ingress>> {
        self.store.state()
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Build a [`StatusSync`] backed by the Kubernetes API.
///
/// Also returns the task driving the Ingress watch; it runs until aborted.
///
/// # Errors
///
/// Returns [`StartupError`] if the pod identity cannot be determined or the
/// leader elector cannot be constructed.
pub async fn build_status_sync(
    client: Client,
    config: &SyncConfig,
) -> Result<(StatusSync, JoinHandle<()>), StartupError> {
    config.validate()?;

    let pod = PodInfo::fetch(&client).await?;
    info!(
        pod = %pod.name,
        namespace = %pod.namespace,
        selector = %pod.selector(),
        "Resolved controller pod identity"
    );

    let elector = LeaseElector::new(client.clone(), config, &pod.namespace, &pod.name)?;
    info!(lock = %elector.lock_name(), "Configured status leader election");

    let (lister, watch_task) = ReflectorIngressLister::start(client.clone());
    lister
        .wait_until_ready(Duration::from_secs(INGRESS_CACHE_SYNC_TIMEOUT_SECS))
        .await;

    let validator = IngressClassFilter::new(
        config.effective_ingress_class(),
        config.default_ingress_class.clone(),
    );
    info!(ingress_class = %validator.ingress_class(), "Publishing status for Ingress class");

    let sync = StatusSync::new(
        config,
        Collaborators {
            pods: Arc::new(KubePodInventory::new(client.clone(), &pod)),
            nodes: Arc::new(KubeNodeResolver::new(client.clone())),
            lister: Arc::new(lister),
            client: Arc::new(KubeIngressClient::new(client)),
            validator: Arc::new(validator),
            elector: Arc::new(elector),
        },
    );
    Ok((sync, watch_task))
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod k8s_tests;
