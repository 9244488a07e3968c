// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use ingress_status::{
    config::{Cli, SyncConfig},
    constants::TOKIO_WORKER_THREADS,
    errors::StartupError,
    k8s::build_status_sync,
    server::run_server,
};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("ingress-status")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_logging();

    let config = SyncConfig::from(Cli::parse());
    config.validate()?;

    info!(
        lock = %config.lock_name(),
        ingress_class = %config.effective_ingress_class(),
        update_interval_secs = config.update_interval.as_secs(),
        "Starting Ingress status sync"
    );

    debug!("Initializing Kubernetes client");
    let started = match Client::try_default().await {
        Ok(client) => {
            debug!("Kubernetes client initialized successfully");
            build_status_sync(client, &config).await
        }
        Err(e) => Err(StartupError::Client(e)),
    };

    // Without a client or a well-formed leadership identity the controller cannot run safely
    let (sync, watch_task) = match started {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "Unable to start Ingress status sync");
            std::process::exit(1);
        }
    };
    let sync = Arc::new(sync);

    let metrics_port = config.metrics_port;
    let server = tokio::spawn(async move {
        if let Err(e) = run_server(metrics_port).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    let mut run = tokio::spawn({
        let sync = sync.clone();
        async move { sync.run().await }
    });

    let exited_early = tokio::select! {
        () = shutdown_signal() => {
            info!("Received termination signal");
            false
        }
        result = &mut run => {
            match result {
                Ok(Ok(())) => warn!("Leader election stopped unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "Leader election failed"),
                Err(e) => error!(error = %e, "Leader election task panicked"),
            }
            true
        }
    };

    sync.shutdown().await;
    if !exited_early {
        match run.await {
            Ok(Ok(())) => debug!("Leader election stopped"),
            Ok(Err(e)) => error!(error = %e, "Leader election failed"),
            Err(e) => error!(error = %e, "Leader election task panicked"),
        }
    }

    watch_task.abort();
    server.abort();

    if exited_early {
        anyhow::bail!("Ingress status sync exited before a termination signal");
    }
    info!("Ingress status sync stopped");
    Ok(())
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    debug!("Logging initialized with file and line number tracking");
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
