// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Catch-up loop
//!
//! Waits on the finality stream and replays every block in
//! `[last_processed, finalized)` in ascending order, feeding candidate events
//! through the [`TrackerState`] and reporting hiccups once per block.
//!
//! ```text
//!            finalized H > last_processed
//!   ┌──────────────────┐ ─────────────────▶ ┌────────────────────┐
//!   │ AwaitingFinality │                     │ Replaying(from, H) │
//!   │  (last_processed)│ ◀───────────────── │  from..H ascending │
//!   └──────────────────┘   last_processed=H  └────────────────────┘
//! ```
//!
//! The finalized block itself is left for the next cycle: the node cannot
//! always serve the newest finalized block yet, and starting the next range at
//! `H` keeps every height visited exactly once.

use crate::client::{ChainClient, RawEvent};
use crate::error::{FetchError, FetchResult, TriageError, TriageResult};
use crate::extractor::EventExtractor;
use crate::metrics::TriageMetrics;
use crate::report::HiccupReporter;
use crate::tracker::TrackerState;
use crate::types::{BlockHiccups, ObservedEvent};
use backoff::ExponentialBackoff;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Replay resumes from `last_processed` once finality moves past it
    AwaitingFinality { last_processed: u64 },
    /// Replaying `[from, to)`; `from` advances as each height completes
    Replaying { from: u64, to: u64 },
}

/// How a replay of a finalized range ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CatchUpConfig {
    /// First height to replay
    pub start_block: u64,
    pub fetch_timeout: Duration,
    /// Zero makes the first failed query fatal
    pub max_retry_duration: Duration,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            fetch_timeout: Duration::from_secs(30),
            max_retry_duration: Duration::ZERO,
        }
    }
}

pub struct CatchUpLoop<C, E, R> {
    client: Arc<C>,
    extractor: E,
    reporter: R,
    tracker: TrackerState,
    state: LoopState,
    config: CatchUpConfig,
    metrics: Option<Arc<TriageMetrics>>,
}

impl<C, E, R> CatchUpLoop<C, E, R>
where
    C: ChainClient,
    E: EventExtractor,
    R: HiccupReporter,
{
    pub fn new(client: Arc<C>, extractor: E, reporter: R, config: CatchUpConfig) -> Self {
        Self {
            client,
            extractor,
            reporter,
            tracker: TrackerState::new(),
            state: LoopState::AwaitingFinality {
                last_processed: config.start_block,
            },
            config,
            metrics: None,
        }
    }

    /// Attach metrics for monitoring
    pub fn with_metrics(mut self, metrics: Arc<TriageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tracker(&self) -> &TrackerState {
        &self.tracker
    }

    /// Drive the loop until cancelled or the finality stream closes.
    ///
    /// Returns the tracker on cancellation, which is honoured between heights
    /// and while a fetch is in flight. Fetch failures and a closed stream are
    /// fatal.
    pub async fn run(
        mut self,
        mut finalized_rx: mpsc::Receiver<u64>,
        cancel: CancellationToken,
    ) -> TriageResult<TrackerState> {
        info!(
            "[CatchUp] Starting catch-up loop from block {}",
            self.resume_height()
        );

        loop {
            let finalized = tokio::select! {
                _ = cancel.cancelled() => return Ok(self.into_cancelled()),
                next = finalized_rx.recv() => match next {
                    Some(height) => height,
                    None => {
                        error!("[CatchUp] Finality stream closed");
                        return Err(TriageError::FinalityStreamClosed);
                    }
                },
            };

            if self.replay_until(finalized, &cancel).await? == ReplayOutcome::Cancelled {
                return Ok(self.into_cancelled());
            }
        }
    }

    fn into_cancelled(self) -> TrackerState {
        info!(
            "[CatchUp] Cancelled at block {} ({} paras tracked)",
            self.resume_height(),
            self.tracker.len()
        );
        self.tracker
    }

    fn resume_height(&self) -> u64 {
        match self.state {
            LoopState::AwaitingFinality { last_processed } => last_processed,
            LoopState::Replaying { from, .. } => from,
        }
    }

    /// Handle one finality notification: replay `[last_processed, finalized)`.
    pub async fn on_finalized(&mut self, finalized: u64) -> TriageResult<()> {
        self.replay_until(finalized, &CancellationToken::new())
            .await
            .map(|_| ())
    }

    /// Like [`Self::on_finalized`], but stops before the next height or
    /// mid-fetch once `cancel` fires. The state then resumes from the first
    /// height that was not fully replayed.
    pub async fn replay_until(
        &mut self,
        finalized: u64,
        cancel: &CancellationToken,
    ) -> TriageResult<ReplayOutcome> {
        let from = self.resume_height();
        if finalized <= from {
            debug!(
                "[CatchUp] Finalized height {} not past {}, nothing to do",
                finalized, from
            );
            return Ok(ReplayOutcome::Completed);
        }

        info!("[CatchUp] Chain is at block #{}", finalized);
        if let Some(ref m) = self.metrics {
            m.last_finalized_block.set(finalized as i64);
        }

        for height in from..finalized {
            if cancel.is_cancelled() {
                self.state = LoopState::AwaitingFinality {
                    last_processed: height,
                };
                return Ok(ReplayOutcome::Cancelled);
            }
            self.state = LoopState::Replaying {
                from: height,
                to: finalized,
            };

            let replayed = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                block = self.replay_height(height) => Some(block),
            };
            let block = match replayed {
                Some(block) => block?,
                None => {
                    debug!("[CatchUp] Replay of block {} interrupted", height);
                    self.state = LoopState::AwaitingFinality {
                        last_processed: height,
                    };
                    return Ok(ReplayOutcome::Cancelled);
                }
            };
            if !block.is_empty() {
                self.reporter.report(&block);
            }

            if let Some(ref m) = self.metrics {
                m.blocks_processed.inc();
                m.last_processed_block.set(height as i64);
            }
        }

        self.state = LoopState::AwaitingFinality {
            last_processed: finalized,
        };
        Ok(ReplayOutcome::Completed)
    }

    async fn replay_height(&mut self, height: u64) -> TriageResult<BlockHiccups> {
        let client = &self.client;
        let hash = self
            .fetch("block_hash", height, || client.block_hash_at(height))
            .await?;
        let events = self
            .fetch("events", height, || client.events_at(&hash))
            .await?;

        debug!(
            "[CatchUp] Block {} ({}) has {} events",
            height,
            hash,
            events.len()
        );
        Ok(self.process_events(height, &events))
    }

    /// Record every candidate event of one block. Unreadable candidate events
    /// are skipped so the rest of the block is still checked.
    fn process_events(&mut self, height: u64, events: &[RawEvent]) -> BlockHiccups {
        let mut hiccups = Vec::new();

        for event in events {
            let candidate = match self.extractor.extract(event) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(e) => {
                    warn!("[CatchUp] Skipping event in block {}: {}", height, e);
                    if let Some(ref m) = self.metrics {
                        m.extraction_errors.inc();
                    }
                    continue;
                }
            };

            if let Some(ref m) = self.metrics {
                m.events_recorded.inc();
            }
            let observed = ObservedEvent::new(height, candidate.kind);
            if let Some(hiccup) = self.tracker.record_event(candidate.para_id, observed) {
                if let Some(ref m) = self.metrics {
                    m.hiccups
                        .with_label_values(&[hiccup.reason().as_str()])
                        .inc();
                }
                hiccups.push(hiccup);
            }
        }

        BlockHiccups { height, hiccups }
    }

    /// Run one chain query under the configured timeout, retrying recoverable
    /// failures until `max_retry_duration` has elapsed.
    async fn fetch<T, F, Fut>(&self, kind: &'static str, height: u64, mut query: F) -> TriageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        // 0.4, 0.8, 1.6, ... capped at 30s, with jitter
        let policy = ExponentialBackoff {
            current_interval: Duration::from_millis(400),
            initial_interval: Duration::from_millis(400),
            randomization_factor: 0.1,
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Some(self.config.max_retry_duration),
            ..Default::default()
        };
        let timeout = self.config.fetch_timeout;
        let started = Instant::now();

        let result = backoff::future::retry(policy, || {
            let attempt = query();
            async move {
                let outcome = match time::timeout(timeout, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::Timeout(format!(
                        "{} for block {} took longer than {:?}",
                        kind, height, timeout
                    ))),
                };
                outcome.map_err(|e| {
                    if e.is_recoverable() {
                        debug!("[CatchUp] Retrying {} for block {}: {}", kind, height, e);
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await;

        if let Some(ref m) = self.metrics {
            m.fetch_latency
                .with_label_values(&[kind])
                .observe(started.elapsed().as_secs_f64());
        }

        result.map_err(|source| {
            error!("[CatchUp] Failed to fetch {} for block {}: {}", kind, height, source);
            TriageError::Fetch { height, source }
        })
    }
}
