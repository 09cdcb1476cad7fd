// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus scrape endpoint

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buf) {
        tracing::error!("[Metrics] Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([(CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response()
}

async fn healthz_handler() -> &'static str {
    "OK"
}

/// Bind `addr` and serve the registry until `cancel` fires
pub async fn start_metrics_server(
    addr: SocketAddr,
    registry: Registry,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Metrics] Listening on {}", listener.local_addr()?);

    let app = metrics_router(registry);
    Ok(tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("[Metrics] Server error: {:?}", e);
        }
    }))
}
