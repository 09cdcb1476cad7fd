// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Parachain candidate triage
//!
//! ```text
//! finality watcher ──(finalized heights)──▶ catch-up loop ──▶ tracker ──▶ reporter
//!        │                                       │
//!        └──────────── sidecar REST ◀────────────┘
//! ```

use anyhow::Context;
use candidate_triage::catch_up::{CatchUpConfig, CatchUpLoop};
use candidate_triage::client::SidecarClient;
use candidate_triage::config::{LogFormat, TriageConfig};
use candidate_triage::extractor::InclusionEventExtractor;
use candidate_triage::finality::spawn_finality_watcher;
use candidate_triage::metrics::TriageMetrics;
use candidate_triage::metrics_server::start_metrics_server;
use candidate_triage::report::TracingReporter;
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[clap(rename_all = "kebab-case", author, version)]
struct Args {
    /// Substrate API Sidecar endpoint of the relay chain
    #[clap(env, long)]
    sidecar_url: Url,
    /// First block to replay
    #[clap(env, long, default_value_t = 0)]
    start_block: u64,
    #[clap(env, long, default_value = "0.0.0.0:9184")]
    metrics_address: SocketAddr,
    /// Optional YAML file with the remaining tunables
    #[clap(env, long)]
    config: Option<PathBuf>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TriageConfig> {
    match path {
        Some(path) => TriageConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(TriageConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    init_tracing(config.log_format);

    tracing::info!(
        "[Main] Starting candidate triage against {} from block {}",
        args.sidecar_url,
        args.start_block
    );

    let cancel = CancellationToken::new();

    let registry = Registry::new();
    let metrics = Arc::new(TriageMetrics::new(&registry));
    let metrics_handle =
        start_metrics_server(args.metrics_address, registry, cancel.child_token())
            .await
            .with_context(|| format!("Failed to bind metrics server on {}", args.metrics_address))?;

    let mut client = SidecarClient::new(&args.sidecar_url, config.fetch_timeout)
        .context("Failed to build sidecar client")?;
    if config.max_retry_duration.is_zero() {
        client = client.with_max_attempts(1);
    }
    let client = Arc::new(client);

    let (watcher_handle, finalized_rx) = spawn_finality_watcher(
        client.clone(),
        config.poll_interval,
        config.channel_size,
        Some(metrics.clone()),
        cancel.child_token(),
    );

    let catch_up = CatchUpLoop::new(
        client,
        InclusionEventExtractor::new(config.inclusion_pallets.clone()),
        TracingReporter,
        CatchUpConfig {
            start_block: args.start_block,
            fetch_timeout: config.fetch_timeout,
            max_retry_duration: config.max_retry_duration,
        },
    )
    .with_metrics(metrics);

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("[Main] Received Ctrl+C, shutting down"),
            Err(e) => tracing::error!("[Main] Failed to listen for Ctrl+C: {}", e),
        }
        shutdown.cancel();
    });

    let result = catch_up.run(finalized_rx, cancel.child_token()).await;

    cancel.cancel();
    let _ = watcher_handle.await;
    let _ = metrics_handle.await;

    match result {
        Ok(tracker) => {
            tracing::info!(
                "[Main] Stopped cleanly with {} paras tracked",
                tracker.len()
            );
            for (para_id, last) in tracker.iter() {
                tracing::debug!("[Main] Id({}): last event {}", para_id, last);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("[Main] Catch-up loop failed: {}", e);
            Err(e.into())
        }
    }
}
