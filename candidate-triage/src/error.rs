// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Error type for chain queries
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl FetchError {
    /// Whether this error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FetchError::Rpc(_) | FetchError::Timeout(_) | FetchError::BlockNotFound(_)
        )
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// A backing/inclusion event whose payload could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("{method} event has no candidate receipt")]
    MissingReceipt { method: String },

    #[error("{method} event has no paraId in its descriptor")]
    MissingParaId { method: String },

    #[error("{method} event has invalid paraId {value}")]
    InvalidParaId { method: String, value: String },
}

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Unknown event kind: {0}")]
    InvalidEventKind(String),

    #[error("Failed to fetch block {height}: {source}")]
    Fetch {
        height: u64,
        #[source]
        source: FetchError,
    },

    #[error("Finality stream closed")]
    FinalityStreamClosed,
}

pub type TriageResult<T> = Result<T, TriageError>;
