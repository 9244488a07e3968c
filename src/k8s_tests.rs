// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `k8s.rs`

#[cfg(test)]
mod tests {
    use crate::errors::StartupError;
    use crate::k8s::{node_address, pod_identity, status_patch, PodInfo};
    use crate::test_support::ingress;
    use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeStatus, Pod};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(addresses: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("node-a".to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: Some(
                    addresses
                        .iter()
                        .map(|(kind, address)| NodeAddress {
                            type_: (*kind).to_string(),
                            address: (*address).to_string(),
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(labels: &[(&str, &str)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("ingress-7d9f".to_string()),
                namespace: Some("ingress-system".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_node_address_prefers_internal() {
        let node = node(&[
            ("Hostname", "node-a"),
            ("ExternalIP", "203.0.113.7"),
            ("InternalIP", "10.0.0.1"),
        ]);
        assert_eq!(node_address(&node, true), Some("10.0.0.1".to_string()));
        assert_eq!(node_address(&node, false), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn test_node_address_falls_back_to_other_type() {
        let internal_only = node(&[("InternalIP", "10.0.0.1")]);
        assert_eq!(
            node_address(&internal_only, false),
            Some("10.0.0.1".to_string())
        );

        let external_only = node(&[("ExternalIP", "203.0.113.7")]);
        assert_eq!(
            node_address(&external_only, true),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_node_address_ignores_empty_and_unknown() {
        assert_eq!(node_address(&node(&[("InternalIP", "")]), true), None);
        assert_eq!(node_address(&node(&[("Hostname", "node-a")]), true), None);
        assert_eq!(node_address(&Node::default(), true), None);
    }

    #[test]
    fn test_pod_identity_requires_both_values() {
        let identity = pod_identity(Some("ingress-0".into()), Some("ingress-system".into()))
            .expect("both values are set");
        assert_eq!(
            identity,
            ("ingress-0".to_string(), "ingress-system".to_string())
        );

        assert!(matches!(
            pod_identity(None, Some("ingress-system".into())),
            Err(StartupError::MissingEnv("POD_NAME"))
        ));
        assert!(matches!(
            pod_identity(Some("ingress-0".into()), Some(String::new())),
            Err(StartupError::MissingEnv("POD_NAMESPACE"))
        ));
    }

    #[test]
    fn test_pod_info_selector_from_labels() {
        let info = PodInfo::from_pod(
            &pod(&[("app", "ingress"), ("tier", "edge")]),
            "fallback",
        )
        .expect("pod has labels");

        assert_eq!(info.name, "ingress-7d9f");
        assert_eq!(info.namespace, "ingress-system");
        assert_eq!(info.selector(), "app=ingress,tier=edge");
    }

    #[test]
    fn test_pod_info_rejects_unlabelled_pod() {
        let result = PodInfo::from_pod(&pod(&[]), "ingress-system");
        assert!(matches!(result, Err(StartupError::NoPodLabels { .. })));
    }

    #[test]
    fn test_status_patch_carries_resource_version() {
        let patch = status_patch(&ingress("default", "web", &["10.0.0.1", "lb.example.com"]));

        assert_eq!(patch["metadata"]["resourceVersion"], "1");
        let entries = patch["status"]["loadBalancer"]["ingress"]
            .as_array()
            .expect("ingress list present");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["ip"], "10.0.0.1");
        assert_eq!(entries[1]["hostname"], "lb.example.com");
    }

    #[test]
    fn test_status_patch_for_cleared_status_keeps_empty_list() {
        let patch = status_patch(&ingress("default", "web", &[]));
        let entries = patch["status"]["loadBalancer"]["ingress"]
            .as_array()
            .expect("empty list is sent, not omitted");
        assert!(entries.is_empty());
    }
}
