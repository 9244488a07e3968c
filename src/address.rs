// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Canonical representation of published load-balancer addresses.
//!
//! Raw address strings (node IPs or resolvable names) are turned into typed
//! [`AddressRecord`]s. Every comparison between the desired addresses and an
//! Ingress' recorded status happens in canonical order:
//!
//! 1. hostname, lexicographic (IP records have an empty hostname and sort first)
//! 2. IP, lexicographic
//!
//! # Example
//!
//! ```rust
//! use ingress_status::address::{addresses_equal, canonicalize, AddressRecord};
//!
//! let desired = canonicalize(["10.0.0.2", "lb.example.com", "10.0.0.1", "10.0.0.2"]);
//! assert_eq!(desired.len(), 3);
//! assert_eq!(desired[0], AddressRecord::Ip("10.0.0.1".to_string()));
//!
//! let mut reversed = desired.clone();
//! reversed.reverse();
//! assert!(addresses_equal(&desired, &reversed));
//! ```

use k8s_openapi::api::networking::v1::{IngressLoadBalancerIngress, IngressLoadBalancerStatus};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

/// A single published address: either a literal IP or a hostname.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressRecord {
    /// Literal IPv4 or IPv6 address
    Ip(String),
    /// DNS name
    Hostname(String),
}

impl AddressRecord {
    /// Classify a raw string: literal IPs become [`AddressRecord::Ip`], anything else a hostname.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.parse::<IpAddr>().is_ok() {
            AddressRecord::Ip(raw.to_string())
        } else {
            AddressRecord::Hostname(raw.to_string())
        }
    }

    /// IP value, or the empty string for hostname records.
    #[must_use]
    pub fn ip(&self) -> &str {
        match self {
            AddressRecord::Ip(ip) => ip,
            AddressRecord::Hostname(_) => "",
        }
    }

    /// Hostname value, or the empty string for IP records.
    #[must_use]
    pub fn hostname(&self) -> &str {
        match self {
            AddressRecord::Ip(_) => "",
            AddressRecord::Hostname(hostname) => hostname,
        }
    }

    /// Build a record from a status entry.
    ///
    /// A non-empty hostname wins over the IP field. Entries carrying neither
    /// become an empty IP record so they still take part in the diff.
    ///
    /// An entry carrying both fields is read as its hostname alone, so it
    /// compares equal to a desired hostname record and is not rewritten.
    /// This controller never writes such entries.
    #[must_use]
    pub fn from_status_entry(entry: &IngressLoadBalancerIngress) -> Self {
        match entry.hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => AddressRecord::Hostname(hostname.to_string()),
            _ => AddressRecord::Ip(entry.ip.clone().unwrap_or_default()),
        }
    }

    /// Convert into the status entry written to `status.loadBalancer.ingress`.
    #[must_use]
    pub fn to_status_entry(&self) -> IngressLoadBalancerIngress {
        match self {
            AddressRecord::Ip(ip) => IngressLoadBalancerIngress {
                ip: Some(ip.clone()),
                ..Default::default()
            },
            AddressRecord::Hostname(hostname) => IngressLoadBalancerIngress {
                hostname: Some(hostname.clone()),
                ..Default::default()
            },
        }
    }
}

impl Ord for AddressRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hostname()
            .cmp(other.hostname())
            .then_with(|| self.ip().cmp(other.ip()))
    }
}

impl PartialOrd for AddressRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressRecord::Ip(ip) => write!(f, "{ip}"),
            AddressRecord::Hostname(hostname) => write!(f, "{hostname}"),
        }
    }
}

/// Turn raw address strings into the desired address set.
///
/// Duplicates are dropped by raw string before classification and the result
/// is returned in canonical order.
#[must_use]
pub fn canonicalize<I, S>(raw: I) -> Vec<AddressRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut records: Vec<AddressRecord> = raw
        .into_iter()
        .filter(|value| seen.insert(value.as_ref().to_string()))
        .map(|value| AddressRecord::parse(value.as_ref()))
        .collect();
    sort_canonical(&mut records);
    records
}

/// Sort records in place under the canonical order (stable).
pub fn sort_canonical(records: &mut [AddressRecord]) {
    records.sort();
}

/// Whether two address lists are equal once both are in canonical order.
#[must_use]
pub fn addresses_equal(lhs: &[AddressRecord], rhs: &[AddressRecord]) -> bool {
    if lhs.len() != rhs.len() {
        return false;
    }

    let mut lhs = lhs.to_vec();
    let mut rhs = rhs.to_vec();
    sort_canonical(&mut lhs);
    sort_canonical(&mut rhs);

    lhs.iter().zip(rhs.iter()).all(|(a, b)| a == b)
}

/// Addresses currently recorded in an Ingress load-balancer status.
#[must_use]
pub fn records_from_status(status: Option<&IngressLoadBalancerStatus>) -> Vec<AddressRecord> {
    status
        .and_then(|lb| lb.ingress.as_ref())
        .map(|entries| entries.iter().map(AddressRecord::from_status_entry).collect())
        .unwrap_or_default()
}

/// Load-balancer status publishing exactly `records`, in canonical order.
#[must_use]
pub fn records_to_status(records: &[AddressRecord]) -> IngressLoadBalancerStatus {
    let mut sorted = records.to_vec();
    sort_canonical(&mut sorted);
    IngressLoadBalancerStatus {
        ingress: Some(sorted.iter().map(AddressRecord::to_status_entry).collect()),
    }
}

/// Render records as a comma separated list for logging.
#[must_use]
pub fn display_records(records: &[AddressRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod address_tests;
