// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain access used by the finality watcher and the catch-up loop

mod sidecar;

pub use sidecar::SidecarClient;

use crate::error::FetchResult;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Hash identifying a block, as returned by the node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(pub String);

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded runtime event, not yet interpreted
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub pallet: String,
    pub method: String,
    pub data: Value,
}

impl RawEvent {
    pub fn new(pallet: impl Into<String>, method: impl Into<String>, data: Value) -> Self {
        Self {
            pallet: pallet.into(),
            method: method.into(),
            data,
        }
    }
}

/// Point-in-time queries against the chain
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the latest finalized block
    async fn finalized_height(&self) -> FetchResult<u64>;

    /// Hash of the block at `height`
    async fn block_hash_at(&self, height: u64) -> FetchResult<BlockHash>;

    /// Events of `block`, in emission order
    async fn events_at(&self, block: &BlockHash) -> FetchResult<Vec<RawEvent>>;
}
