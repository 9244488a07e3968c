// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys read from Kubernetes objects.

// ============================================================================
// Ingress Annotations
// ============================================================================

/// Legacy annotation selecting which controller class owns an Ingress
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

// ============================================================================
// Node Address Types
// ============================================================================

/// `NodeAddress.type` for the cluster-internal address of a node
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// `NodeAddress.type` for the externally routable address of a node
pub const NODE_EXTERNAL_IP: &str = "ExternalIP";
