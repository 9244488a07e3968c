// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP server exposing Prometheus metrics and a liveness probe.
//!
//! - `GET /metrics` - Prometheus text format from [`crate::metrics`]
//! - `GET /healthz` - always `200 OK` while the process serves requests

use crate::constants::{HEALTH_SERVER_PATH, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};
use crate::metrics::gather_metrics;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Router serving the metrics and health endpoints.
pub fn router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics))
        .route(HEALTH_SERVER_PATH, get(healthz))
}

/// Serve [`router`] on `port` until the task is aborted.
///
/// # Errors
///
/// Returns an I/O error if the port cannot be bound or serving fails.
pub async fn run_server(port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind((METRICS_SERVER_BIND_ADDRESS, port)).await?;
    info!(
        port = port,
        metrics_path = METRICS_SERVER_PATH,
        health_path = HEALTH_SERVER_PATH,
        "Metrics server listening"
    );
    axum::serve(listener, router()).await
}

async fn healthz() -> StatusCode {
    debug!("Liveness probe: OK");
    StatusCode::OK
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
