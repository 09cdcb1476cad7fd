// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Finality notifications
//!
//! Polls the finalized head and forwards every increase into a channel. The
//! receiving end is the finality stream the catch-up loop waits on; the
//! channel closing means the chain connection is gone for good.

use crate::client::ChainClient;
use crate::metrics::TriageMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Spawn the watcher task and return it together with the finality stream
pub fn spawn_finality_watcher<C>(
    client: Arc<C>,
    poll_interval: Duration,
    channel_size: usize,
    metrics: Option<Arc<TriageMetrics>>,
    cancel: CancellationToken,
) -> (JoinHandle<()>, mpsc::Receiver<u64>)
where
    C: ChainClient + 'static,
{
    let (finalized_tx, finalized_rx) = mpsc::channel(channel_size.max(1));
    let handle = tokio::spawn(async move {
        run_finality_watcher(client, poll_interval, finalized_tx, metrics, cancel).await;
    });
    (handle, finalized_rx)
}

async fn run_finality_watcher<C: ChainClient>(
    client: Arc<C>,
    poll_interval: Duration,
    finalized_tx: mpsc::Sender<u64>,
    metrics: Option<Arc<TriageMetrics>>,
    cancel: CancellationToken,
) {
    info!(
        "[Finality] Starting finalized head watcher (interval={:?})",
        poll_interval
    );

    let mut last_height = None;
    let mut interval = time::interval(poll_interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[Finality] Watcher cancelled");
                break;
            }
            _ = interval.tick() => {
                match client.finalized_height().await {
                    Ok(height) => {
                        if last_height.map_or(true, |last| height > last) {
                            debug!("[Finality] New finalized height: {}", height);
                            if let Some(ref m) = metrics {
                                m.last_finalized_block.set(height as i64);
                            }
                            if finalized_tx.send(height).await.is_err() {
                                info!("[Finality] Receiver dropped, stopping watcher");
                                break;
                            }
                            last_height = Some(height);
                        }
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("[Finality] Failed to get finalized height: {}", e);
                    }
                    Err(e) => {
                        error!("[Finality] Unrecoverable error getting finalized height: {}", e);
                        break;
                    }
                }
            }
        }
    }
}
