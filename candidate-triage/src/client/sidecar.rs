// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain client backed by a Substrate API Sidecar instance
//!
//! Sidecar serves decoded blocks over plain HTTP, so events arrive as JSON
//! (`{"method": {"pallet", "method"}, "data": [...]}`) and no runtime metadata
//! is needed on this side.

use super::{BlockHash, ChainClient, RawEvent};
use crate::error::{FetchError, FetchResult};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MAX_ATTEMPTS: usize = 3;

#[derive(Clone, Debug)]
pub struct SidecarClient {
    http_client: reqwest::Client,
    base_url: String,
    max_attempts: usize,
    // events of the block last resolved by `block_hash_at`
    last_block: Arc<Mutex<Option<(BlockHash, Vec<RawEvent>)>>>,
}

#[derive(Debug, Deserialize)]
struct SidecarHeader {
    number: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarBlock {
    number: Value,
    hash: BlockHash,
    #[serde(default)]
    on_initialize: Option<SidecarEventBlock>,
    #[serde(default)]
    extrinsics: Vec<SidecarEventBlock>,
    #[serde(default)]
    on_finalize: Option<SidecarEventBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct SidecarEventBlock {
    #[serde(default)]
    events: Vec<SidecarEvent>,
}

#[derive(Debug, Deserialize)]
struct SidecarEvent {
    method: SidecarMethod,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SidecarMethod {
    pallet: String,
    method: String,
}

impl SidecarClient {
    pub fn new(base_url: &Url, request_timeout: Duration) -> FetchResult<Self> {
        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Rpc(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            max_attempts: MAX_ATTEMPTS,
            last_block: Arc::new(Mutex::new(None)),
        })
    }

    /// Attempts per request on transient transport errors. `1` disables the
    /// in-client retry.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body as JSON. `Ok(None)` when Sidecar answers
    /// 400/404, which it does for blocks it cannot serve (yet).
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> FetchResult<Option<Value>> {
        let url = format!("{}/{}", self.base_url, path);

        fn is_transient_transport_error(err: &reqwest::Error) -> bool {
            if err.is_connect() || err.is_timeout() {
                return true;
            }

            let mut msg = err.to_string().to_lowercase();
            let mut source = err.source();
            while let Some(cause) = source {
                msg.push_str(": ");
                msg.push_str(&cause.to_string().to_lowercase());
                source = cause.source();
            }
            msg.contains("connection closed")
                || msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("unexpected eof")
                || msg.contains("incomplete")
        }

        let mut last_transport_err = None;

        let max_attempts = self.max_attempts;
        for attempt in 0..max_attempts {
            let response = match self.http_client.get(&url).query(query).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 < max_attempts && is_transient_transport_error(&err) {
                        warn!(
                            "[Sidecar] transport error on {} (attempt {}/{}), retrying",
                            path,
                            attempt + 1,
                            max_attempts
                        );
                        last_transport_err = Some(err);
                        tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(transport_error(path, &err));
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
                debug!("[Sidecar] {} answered {}", path, status);
                return Ok(None);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Rpc(format!(
                    "HTTP error on {}: {} - {}",
                    path, status, body
                )));
            }

            return match response.json::<Value>().await {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.is_decode() => Err(FetchError::InvalidResponse(format!(
                    "Failed to decode {}: {}",
                    path, err
                ))),
                Err(err) => Err(transport_error(path, &err)),
            };
        }

        Err(last_transport_err
            .map(|err| transport_error(path, &err))
            .unwrap_or_else(|| FetchError::Rpc(format!("GET {} failed after retries", path))))
    }
}

fn transport_error(path: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(format!("GET {}", path))
    } else {
        FetchError::Rpc(format!("GET {}: {}", path, err))
    }
}

/// Sidecar encodes block numbers as decimal strings; accept plain numbers too
fn parse_number(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn parse_finalized_height(value: Value) -> FetchResult<u64> {
    let header: SidecarHeader = serde_json::from_value(value)
        .map_err(|e| FetchError::InvalidResponse(format!("Invalid header: {}", e)))?;
    parse_number(&header.number).ok_or_else(|| {
        FetchError::InvalidResponse(format!("Invalid header number: {}", header.number))
    })
}

fn parse_block(value: Value) -> FetchResult<SidecarBlock> {
    serde_json::from_value(value)
        .map_err(|e| FetchError::InvalidResponse(format!("Invalid block: {}", e)))
}

fn flatten_events(block: SidecarBlock) -> Vec<RawEvent> {
    let SidecarBlock {
        on_initialize,
        extrinsics,
        on_finalize,
        ..
    } = block;

    on_initialize
        .into_iter()
        .chain(extrinsics)
        .chain(on_finalize)
        .flat_map(|phase| phase.events)
        .map(|event| RawEvent::new(event.method.pallet, event.method.method, event.data))
        .collect()
}

#[async_trait::async_trait]
impl ChainClient for SidecarClient {
    async fn finalized_height(&self) -> FetchResult<u64> {
        let value = self
            .get("blocks/head/header", &[("finalized", "true")])
            .await?
            .ok_or_else(|| FetchError::Rpc("Finalized head not available".to_string()))?;
        parse_finalized_height(value)
    }

    async fn block_hash_at(&self, height: u64) -> FetchResult<BlockHash> {
        let path = format!("blocks/{}", height);
        let value = self
            .get(&path, &[("eventDocs", "false"), ("extrinsicDocs", "false")])
            .await?
            .ok_or(FetchError::BlockNotFound(height))?;
        let block = parse_block(value)?;

        if parse_number(&block.number) != Some(height) {
            return Err(FetchError::InvalidResponse(format!(
                "Asked for block {}, got {}",
                height, block.number
            )));
        }

        // Sidecar headers carry no hash, so the full block is already here
        let hash = block.hash.clone();
        let events = flatten_events(block);
        if let Ok(mut last) = self.last_block.lock() {
            *last = Some((hash.clone(), events));
        }
        Ok(hash)
    }

    async fn events_at(&self, block: &BlockHash) -> FetchResult<Vec<RawEvent>> {
        let cached = match self.last_block.lock() {
            Ok(mut last) => match last.take() {
                Some((hash, events)) if &hash == block => Some(events),
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(events) = cached {
            return Ok(events);
        }

        let path = format!("blocks/{}", block);
        let value = self
            .get(&path, &[("eventDocs", "false"), ("extrinsicDocs", "false")])
            .await?
            .ok_or_else(|| FetchError::Rpc(format!("Block {} not available", block)))?;
        Ok(flatten_events(parse_block(value)?))
    }
}
