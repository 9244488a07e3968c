// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # ingress-status - Ingress load-balancer status synchronizer
//!
//! Publishes the addresses where a replicated ingress controller is reachable
//! into `status.loadBalancer.ingress` of every Ingress it owns. Many replicas
//! may run; only the elected leader writes.
//!
//! ## Overview
//!
//! While leading, a periodic reconcile loop:
//!
//! 1. lists the controller's own pods and resolves their nodes to addresses
//! 2. canonicalizes the address list (IP vs hostname, deduplicated, sorted)
//! 3. compares it with each eligible Ingress' status and rewrites the ones that differ,
//!    with bounded concurrency and per-Ingress failure isolation
//!
//! On shutdown the last replica leaving clears the published addresses.
//!
//! ## Modules
//!
//! - [`address`] - Address records, canonical order and equality
//! - [`probe`] - Replica address discovery and replica count guard
//! - [`updater`] - Bounded fan-out of status updates
//! - [`trigger`] - Coalescing single-slot sync trigger
//! - [`sync_loop`] - Leader-gated reconcile loop
//! - [`shutdown`] - Termination path
//! - [`status_sync`] - Public `run`/`shutdown` entry point
//! - [`leader`] - Leader election traits and the Lease-based elector
//! - [`k8s`] - Kubernetes implementations of the collaborators
//!
//! ## Example
//!
//! ```rust,no_run
//! use ingress_status::address::{addresses_equal, canonicalize};
//!
//! let desired = canonicalize(["10.0.0.2", "svc.example.com", "10.0.0.1"]);
//! let current = canonicalize(["svc.example.com", "10.0.0.1", "10.0.0.2"]);
//! assert!(addresses_equal(&desired, &current));
//! ```

pub mod address;
pub mod cancel;
pub mod class;
pub mod config;
pub mod constants;
pub mod errors;
pub mod k8s;
pub mod labels;
pub mod leader;
pub mod metrics;
pub mod probe;
pub mod server;
pub mod shutdown;
pub mod status_sync;
pub mod store;
pub mod sync_loop;
pub mod trigger;
pub mod updater;

#[cfg(test)]
mod test_support;
