// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mocks shared by unit tests

use crate::client::{BlockHash, ChainClient, RawEvent};
use crate::error::{FetchError, FetchResult};
use crate::extractor::{CANDIDATE_BACKED, CANDIDATE_INCLUDED};
use crate::report::HiccupReporter;
use crate::types::BlockHiccups;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub fn backed(para_id: u32) -> RawEvent {
    candidate_event(CANDIDATE_BACKED, para_id)
}

pub fn included(para_id: u32) -> RawEvent {
    candidate_event(CANDIDATE_INCLUDED, para_id)
}

fn candidate_event(method: &str, para_id: u32) -> RawEvent {
    RawEvent::new(
        "paraInclusion",
        method,
        json!([{ "descriptor": { "paraId": para_id.to_string() } }, "0x", "0", "1"]),
    )
}

pub fn unrelated() -> RawEvent {
    RawEvent::new("system", "ExtrinsicSuccess", json!([{}]))
}

fn hash_for(height: u64) -> BlockHash {
    BlockHash(format!("0x{:064x}", height))
}

fn height_for(hash: &BlockHash) -> Option<u64> {
    u64::from_str_radix(hash.0.trim_start_matches("0x"), 16).ok()
}

/// In-memory chain. Blocks without events configured are empty.
#[derive(Clone, Debug, Default)]
pub struct MockChainClient {
    finalized: Arc<Mutex<VecDeque<FetchResult<u64>>>>,
    events: Arc<Mutex<HashMap<u64, Vec<RawEvent>>>>,
    hash_failures: Arc<Mutex<HashMap<u64, VecDeque<FetchError>>>>,
    stalled: Arc<Mutex<HashSet<u64>>>,
    requested_heights: Arc<Mutex<Vec<u64>>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `finalized_height` call
    pub fn push_finalized(&self, response: FetchResult<u64>) {
        self.finalized.lock().unwrap().push_back(response);
    }

    pub fn set_events(&self, height: u64, events: Vec<RawEvent>) {
        self.events.lock().unwrap().insert(height, events);
    }

    /// Make the next `block_hash_at(height)` call fail with `error`
    pub fn fail_block_hash(&self, height: u64, error: FetchError) {
        self.hash_failures
            .lock()
            .unwrap()
            .entry(height)
            .or_default()
            .push_back(error);
    }

    /// Make every `block_hash_at(height)` call hang
    pub fn stall_block_hash(&self, height: u64) {
        self.stalled.lock().unwrap().insert(height);
    }

    /// Heights passed to `block_hash_at`, in call order
    pub fn requested_heights(&self) -> Vec<u64> {
        self.requested_heights.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChainClient for MockChainClient {
    async fn finalized_height(&self) -> FetchResult<u64> {
        self.finalized
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Rpc("no finalized head queued".to_string())))
    }

    async fn block_hash_at(&self, height: u64) -> FetchResult<BlockHash> {
        self.requested_heights.lock().unwrap().push(height);

        let stalled = self.stalled.lock().unwrap().contains(&height);
        if stalled {
            std::future::pending::<()>().await;
        }

        let failure = self
            .hash_failures
            .lock()
            .unwrap()
            .get_mut(&height)
            .and_then(|q| q.pop_front());
        match failure {
            Some(e) => Err(e),
            None => Ok(hash_for(height)),
        }
    }

    async fn events_at(&self, block: &BlockHash) -> FetchResult<Vec<RawEvent>> {
        let height = height_for(block)
            .ok_or_else(|| FetchError::InvalidResponse(format!("unknown block {}", block)))?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }
}

/// Keeps every report for later inspection
#[derive(Clone, Debug, Default)]
pub struct CollectingReporter {
    reports: Arc<Mutex<Vec<BlockHiccups>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<BlockHiccups> {
        self.reports.lock().unwrap().clone()
    }
}

impl HiccupReporter for CollectingReporter {
    fn report(&self, block: &BlockHiccups) {
        self.reports.lock().unwrap().push(block.clone());
    }
}
