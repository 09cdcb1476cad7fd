// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, HistogramVec,
    IntCounter, IntCounterVec, IntGauge, Registry,
};

const FETCH_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10., 30., 60.,
];

#[derive(Clone, Debug)]
pub struct TriageMetrics {
    pub(crate) blocks_processed: IntCounter,
    pub(crate) events_recorded: IntCounter,
    pub(crate) hiccups: IntCounterVec,
    pub(crate) extraction_errors: IntCounter,
    pub(crate) last_processed_block: IntGauge,
    pub(crate) last_finalized_block: IntGauge,
    pub(crate) fetch_latency: HistogramVec,
}

impl TriageMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            blocks_processed: register_int_counter_with_registry!(
                "triage_blocks_processed",
                "Total number of finalized blocks replayed",
                registry,
            )
            .unwrap(),
            events_recorded: register_int_counter_with_registry!(
                "triage_events_recorded",
                "Total number of candidate events fed to the tracker",
                registry,
            )
            .unwrap(),
            hiccups: register_int_counter_vec_with_registry!(
                "triage_hiccups",
                "Total number of hiccups detected, by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            extraction_errors: register_int_counter_with_registry!(
                "triage_extraction_errors",
                "Total number of candidate events skipped because their payload was unreadable",
                registry,
            )
            .unwrap(),
            last_processed_block: register_int_gauge_with_registry!(
                "triage_last_processed_block",
                "Height of the last fully replayed block",
                registry,
            )
            .unwrap(),
            last_finalized_block: register_int_gauge_with_registry!(
                "triage_last_finalized_block",
                "Latest finalized height seen by the catch-up loop",
                registry,
            )
            .unwrap(),
            fetch_latency: register_histogram_vec_with_registry!(
                "triage_fetch_latency",
                "Latency of chain queries, by query kind",
                &["kind"],
                FETCH_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
