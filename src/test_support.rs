// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory collaborators shared by the unit tests.

use crate::address::{records_from_status, records_to_status, AddressRecord};
use crate::cancel::CancelSignal;
use crate::class::EligibilityValidator;
use crate::errors::{DiscoveryError, LeaderElectionError};
use crate::leader::{LeaderCallbacks, LeaderElector};
use crate::probe::{NodeAddressResolver, PodInventory, ReplicaPod};
use crate::store::{IngressLister, IngressStatusClient};
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{Ingress, IngressStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a `kube::Error::Api` with the given HTTP status code.
pub fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(
        kube::core::Status::failure(&format!("simulated API error {code}"), "Simulated")
            .with_code(code)
            .boxed(),
    )
}

/// Build an Ingress whose status publishes `addresses` (raw strings).
pub fn ingress(namespace: &str, name: &str, addresses: &[&str]) -> Ingress {
    let records: Vec<AddressRecord> = addresses.iter().map(|a| AddressRecord::parse(a)).collect();
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: None,
        status: Some(IngressStatus {
            load_balancer: Some(records_to_status(&records)),
        }),
    }
}

/// Addresses currently recorded in an Ingress.
pub fn published(ingress: &Ingress) -> Vec<AddressRecord> {
    records_from_status(
        ingress
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref()),
    )
}

/// Pod inventory returning a fixed replica list, optionally failing.
#[derive(Default)]
pub struct FakePods {
    replicas: Mutex<Vec<ReplicaPod>>,
    fail: AtomicBool,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakePods {
    /// One replica per entry, scheduled on the given node.
    pub fn on_nodes(nodes: &[&str]) -> Self {
        let replicas = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| ReplicaPod {
                name: format!("ingress-{i}"),
                node_name: Some((*node).to_string()),
            })
            .collect();
        Self {
            replicas: Mutex::new(replicas),
            ..Default::default()
        }
    }

    /// Inventory whose listing always fails.
    pub fn failing() -> Self {
        let pods = Self::default();
        pods.fail.store(true, Ordering::SeqCst);
        pods
    }

    /// Replace the replica list.
    pub fn set_replicas(&self, replicas: Vec<ReplicaPod>) {
        *self.replicas.lock().unwrap() = replicas;
    }

    /// Copy of the current replica list.
    pub fn snapshot(&self) -> Vec<ReplicaPod> {
        self.replicas.lock().unwrap().clone()
    }

    /// Make the listing fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delay every listing, to simulate a slow API server.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Number of listings performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodInventory for FakePods {
    async fn list_replicas(&self) -> Result<Vec<ReplicaPod>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DiscoveryError::PodListFailed {
                namespace: "ingress-system".to_string(),
                selector: "app=ingress".to_string(),
                source: api_error(503),
            });
        }
        Ok(self.replicas.lock().unwrap().clone())
    }
}

/// Node resolver backed by a static map; unknown nodes resolve to their name.
#[derive(Default)]
pub struct FakeNodes {
    internal: HashMap<String, String>,
    external: HashMap<String, String>,
}

impl FakeNodes {
    /// Map of node name to internal address.
    pub fn internal(pairs: &[(&str, &str)]) -> Self {
        Self {
            internal: pairs
                .iter()
                .map(|(n, a)| ((*n).to_string(), (*a).to_string()))
                .collect(),
            external: HashMap::new(),
        }
    }

    /// Add an external address for a node.
    pub fn with_external(mut self, node: &str, address: &str) -> Self {
        self.external.insert(node.to_string(), address.to_string());
        self
    }
}

#[async_trait]
impl NodeAddressResolver for FakeNodes {
    async fn resolve(&self, node: &str, prefer_internal: bool) -> String {
        if prefer_internal {
            if let Some(address) = self.internal.get(node) {
                return address.clone();
            }
        }
        self.external
            .get(node)
            .or_else(|| self.internal.get(node))
            .cloned()
            .unwrap_or_else(|| node.to_string())
    }
}

/// Validator accepting every Ingress.
pub struct AcceptAll;

impl EligibilityValidator for AcceptAll {
    fn is_eligible(&self, _ingress: &Ingress) -> bool {
        true
    }
}

/// Validator rejecting Ingresses by name.
pub struct RejectNamed(pub HashSet<String>);

impl EligibilityValidator for RejectNamed {
    fn is_eligible(&self, ingress: &Ingress) -> bool {
        !ingress
            .metadata
            .name
            .as_ref()
            .is_some_and(|name| self.0.contains(name))
    }
}

/// A recorded status write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    pub namespace: String,
    pub name: String,
    pub addresses: Vec<AddressRecord>,
}

/// In-memory Ingress store acting as both lister and API client.
#[derive(Default)]
pub struct FakeIngressStore {
    objects: Mutex<BTreeMap<(String, String), Ingress>>,
    writes: Mutex<Vec<Write>>,
    fail_get: Mutex<HashSet<String>>,
    fail_write: Mutex<HashMap<String, u16>>,
    write_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gets: AtomicUsize,
}

impl FakeIngressStore {
    /// Store pre-populated with the given Ingresses.
    pub fn with(ingresses: Vec<Ingress>) -> Self {
        let store = Self::default();
        for ing in ingresses {
            store.insert(ing);
        }
        store
    }

    /// Insert or replace an Ingress.
    pub fn insert(&self, ingress: Ingress) {
        let key = (
            ingress.metadata.namespace.clone().unwrap_or_default(),
            ingress.metadata.name.clone().unwrap_or_default(),
        );
        self.objects.lock().unwrap().insert(key, ingress);
    }

    /// Make `get` fail for the named Ingress.
    pub fn fail_get_for(&self, name: &str) {
        self.fail_get.lock().unwrap().insert(name.to_string());
    }

    /// Make `update_status` fail with `code` for the named Ingress.
    pub fn fail_write_for(&self, name: &str, code: u16) {
        self.fail_write
            .lock()
            .unwrap()
            .insert(name.to_string(), code);
    }

    /// Delay every write, so concurrent writes overlap.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    /// Every successful write, in completion order.
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Number of `get` calls.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current addresses of an Ingress in the store.
    pub fn addresses_of(&self, namespace: &str, name: &str) -> Vec<AddressRecord> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .map(published)
            .unwrap_or_default()
    }
}

impl IngressLister for FakeIngressStore {
    fn list(&self) -> Vec<Arc<Ingress>> {
        self.objects
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(Arc::new)
            .collect()
    }
}

#[async_trait]
impl IngressStatusClient for FakeIngressStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Ingress, kube::Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.lock().unwrap().contains(name) {
            return Err(api_error(500));
        }
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| api_error(404))
    }

    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, kube::Error> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = self.apply_write(ingress);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeIngressStore {
    fn apply_write(&self, ingress: &Ingress) -> Result<Ingress, kube::Error> {
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let name = ingress.metadata.name.clone().unwrap_or_default();

        if let Some(code) = self.fail_write.lock().unwrap().get(&name) {
            return Err(api_error(*code));
        }

        let mut objects = self.objects.lock().unwrap();
        let key = (namespace.clone(), name.clone());
        let stored = objects.get(&key).ok_or_else(|| api_error(404))?;
        if stored.metadata.resource_version != ingress.metadata.resource_version {
            return Err(api_error(409));
        }

        let mut updated = ingress.clone();
        let next_version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        updated.metadata.resource_version = Some(next_version.to_string());
        objects.insert(key, updated.clone());

        self.writes.lock().unwrap().push(Write {
            namespace,
            name,
            addresses: published(&updated),
        });
        Ok(updated)
    }
}

/// Elector whose leadership is decided by the test.
pub struct FakeElector {
    lead_on_start: bool,
    leader: AtomicBool,
    callbacks: Mutex<Option<Arc<dyn LeaderCallbacks>>>,
}

impl FakeElector {
    /// Elector that wins the election as soon as it runs.
    pub fn leader() -> Self {
        Self {
            lead_on_start: true,
            leader: AtomicBool::new(false),
            callbacks: Mutex::new(None),
        }
    }

    /// Elector that never wins.
    pub fn follower() -> Self {
        Self {
            lead_on_start: false,
            ..Self::leader()
        }
    }

    /// Take leadership away, as if the lease went to another replica.
    pub async fn depose(&self) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        if let Some(callbacks) = callbacks {
            if self.leader.swap(false, Ordering::SeqCst) {
                callbacks.on_new_leader("other-replica");
                callbacks.on_stopped_leading().await;
            }
        }
    }
}

#[async_trait]
impl LeaderElector for FakeElector {
    async fn run(
        &self,
        callbacks: Arc<dyn LeaderCallbacks>,
        mut shutdown: CancelSignal,
    ) -> Result<(), LeaderElectionError> {
        *self.callbacks.lock().unwrap() = Some(callbacks.clone());
        if self.lead_on_start {
            self.leader.store(true, Ordering::SeqCst);
            callbacks.on_new_leader("ingress-0");
            callbacks.on_started_leading().await;
        }

        shutdown.cancelled().await;

        if self.leader.swap(false, Ordering::SeqCst) {
            callbacks.on_stopped_leading().await;
        }
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}
