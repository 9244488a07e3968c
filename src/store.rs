// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to the managed Ingress resources.
//!
//! Listing comes from a point-in-time snapshot (usually a reflector cache and
//! possibly stale); reads and writes of individual objects go to the API so the
//! status write carries the latest `resourceVersion`.

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;

/// Snapshot of every Ingress the controller can see.
pub trait IngressLister: Send + Sync {
    /// Current snapshot; may lag behind the API server.
    fn list(&self) -> Vec<Arc<Ingress>>;
}

/// Read/write access to individual Ingress objects.
///
/// `update_status` must be conditional on the `resourceVersion` of the object
/// passed in, so a concurrent modification surfaces as a 409 conflict.
#[async_trait]
pub trait IngressStatusClient: Send + Sync {
    /// Fetch the latest revision of an Ingress.
    async fn get(&self, namespace: &str, name: &str) -> Result<Ingress, kube::Error>;

    /// Write `ingress.status` back to the API.
    async fn update_status(&self, ingress: &Ingress) -> Result<Ingress, kube::Error>;
}
