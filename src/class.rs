// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress class eligibility.
//!
//! Only Ingresses belonging to this controller's class have their status
//! managed. There are two valid combinations:
//!
//! 1. controller runs the default class, Ingress declares no class
//! 2. controller runs class `X`, Ingress declares class `X`
//!
//! Every other combination is left alone.

use crate::labels::INGRESS_CLASS_ANNOTATION;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::trace;

/// Decides whether an Ingress is managed by this controller.
pub trait EligibilityValidator: Send + Sync {
    /// `true` if the Ingress status may be written by this controller.
    fn is_eligible(&self, ingress: &Ingress) -> bool;
}

/// Class-based eligibility using the `kubernetes.io/ingress.class` annotation,
/// falling back to `spec.ingressClassName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressClassFilter {
    ingress_class: String,
    default_class: String,
}

impl IngressClassFilter {
    /// Create a filter for `ingress_class`, where `default_class` is the class
    /// implied by Ingresses that declare none.
    #[must_use]
    pub fn new(ingress_class: impl Into<String>, default_class: impl Into<String>) -> Self {
        Self {
            ingress_class: ingress_class.into(),
            default_class: default_class.into(),
        }
    }

    /// Class handled by this filter.
    #[must_use]
    pub fn ingress_class(&self) -> &str {
        &self.ingress_class
    }
}

/// Class declared by an Ingress, or the empty string when it declares none.
#[must_use]
pub fn declared_class(ingress: &Ingress) -> &str {
    if let Some(class) = ingress.annotations().get(INGRESS_CLASS_ANNOTATION) {
        return class;
    }

    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_deref())
        .unwrap_or_default()
}

impl EligibilityValidator for IngressClassFilter {
    fn is_eligible(&self, ingress: &Ingress) -> bool {
        let declared = declared_class(ingress);

        if declared.is_empty() && self.ingress_class == self.default_class {
            return true;
        }

        let eligible = declared == self.ingress_class;
        if !eligible {
            trace!(
                namespace = ?ingress.namespace(),
                name = %ingress.name_any(),
                declared_class = declared,
                controller_class = %self.ingress_class,
                "Ignoring Ingress of another class"
            );
        }
        eligible
    }
}

#[cfg(test)]
#[path = "class_tests.rs"]
mod class_tests;
