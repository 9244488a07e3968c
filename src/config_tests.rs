// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::{Cli, SyncConfig};
    use crate::errors::StartupError;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_lock_name_uses_default_class() {
        let config = SyncConfig {
            election_id: "ingress-controller-leader".to_string(),
            default_ingress_class: "nginx".to_string(),
            ingress_class: None,
            ..Default::default()
        };

        assert_eq!(config.lock_name(), "ingress-controller-leader-nginx");
    }

    #[test]
    fn test_lock_name_prefers_class_override() {
        let config = SyncConfig {
            election_id: "ingress-controller-leader".to_string(),
            default_ingress_class: "nginx".to_string(),
            ingress_class: Some("internal".to_string()),
            ..Default::default()
        };

        assert_eq!(config.lock_name(), "ingress-controller-leader-internal");
        assert_eq!(config.effective_ingress_class(), "internal");
    }

    #[test]
    fn test_empty_class_override_falls_back_to_default() {
        let config = SyncConfig {
            ingress_class: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(config.effective_ingress_class(), "nginx");
    }

    #[test]
    fn test_lease_timings_derive_from_duration() {
        let config = SyncConfig {
            lease_duration: Duration::from_secs(30),
            ..Default::default()
        };

        assert_eq!(config.renew_deadline(), Duration::from_secs(15));
        assert_eq!(config.retry_period(), Duration::from_millis(7500));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_updates, 10);
        assert!(config.prefer_internal_ip);
    }

    #[test]
    fn test_validate_rejects_empty_election_id() {
        let config = SyncConfig {
            election_id: "  ".to_string(),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, StartupError::InvalidConfig(ref msg) if msg.contains("election id")));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_interval = SyncConfig {
            update_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let zero_concurrency = SyncConfig {
            max_concurrent_updates: 0,
            ..Default::default()
        };
        assert!(zero_concurrency.validate().is_err());

        let tiny_lease = SyncConfig {
            lease_duration: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(tiny_lease.validate().is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ingress-status"]).expect("defaults should parse");
        let config = SyncConfig::from(cli);

        assert_eq!(config.election_id, "ingress-controller-leader");
        assert_eq!(config.default_ingress_class, "nginx");
        assert_eq!(config.ingress_class, None);
        assert_eq!(config.lease_duration, Duration::from_secs(30));
        assert_eq!(config.metrics_port, 8080);
        assert!(config.prefer_internal_ip);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "ingress-status",
            "--election-id",
            "status-leader",
            "--ingress-class",
            "public",
            "--update-interval-secs",
            "15",
            "--max-concurrent-updates",
            "4",
            "--publish-external-ip",
        ])
        .expect("flags should parse");
        let config = SyncConfig::from(cli);

        assert_eq!(config.lock_name(), "status-leader-public");
        assert_eq!(config.update_interval, Duration::from_secs(15));
        assert_eq!(config.max_concurrent_updates, 4);
        assert!(!config.prefer_internal_ip);
    }
}
