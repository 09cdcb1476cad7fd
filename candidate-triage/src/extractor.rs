// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Picks candidate backing/inclusion events out of a block's event log

use crate::client::RawEvent;
use crate::error::ExtractionError;
use crate::types::{CandidateEvent, EventKind, ParaId};
use serde_json::Value;

pub const CANDIDATE_BACKED: &str = "CandidateBacked";
pub const CANDIDATE_INCLUDED: &str = "CandidateIncluded";

/// Pallet names the inclusion module has been deployed under
pub fn default_inclusion_pallets() -> Vec<String> {
    vec![
        "paraInclusion".to_string(),
        "parasInclusion".to_string(),
        "inclusion".to_string(),
    ]
}

pub trait EventExtractor: Send + Sync {
    /// `Ok(None)` for events that are not relevant. `Err` only for a relevant
    /// event whose payload cannot be read.
    fn extract(&self, event: &RawEvent) -> Result<Option<CandidateEvent>, ExtractionError>;
}

/// Recognises `CandidateBacked` / `CandidateIncluded` from the inclusion pallet
#[derive(Debug, Clone)]
pub struct InclusionEventExtractor {
    pallets: Vec<String>,
}

impl InclusionEventExtractor {
    pub fn new(pallets: Vec<String>) -> Self {
        Self { pallets }
    }

    fn is_inclusion_pallet(&self, pallet: &str) -> bool {
        self.pallets.iter().any(|p| p.eq_ignore_ascii_case(pallet))
    }
}

impl Default for InclusionEventExtractor {
    fn default() -> Self {
        Self::new(default_inclusion_pallets())
    }
}

impl EventExtractor for InclusionEventExtractor {
    fn extract(&self, event: &RawEvent) -> Result<Option<CandidateEvent>, ExtractionError> {
        if !self.is_inclusion_pallet(&event.pallet) {
            return Ok(None);
        }

        let kind = if event.method.eq_ignore_ascii_case(CANDIDATE_BACKED) {
            EventKind::Backed
        } else if event.method.eq_ignore_ascii_case(CANDIDATE_INCLUDED) {
            EventKind::Included
        } else {
            return Ok(None);
        };

        let para_id = receipt_para_id(&event.method, &event.data)?;
        Ok(Some(CandidateEvent { para_id, kind }))
    }
}

/// The candidate receipt is the first event argument; its descriptor carries the para id
fn receipt_para_id(method: &str, data: &Value) -> Result<ParaId, ExtractionError> {
    let receipt = data
        .get(0)
        .filter(|r| r.is_object())
        .ok_or_else(|| ExtractionError::MissingReceipt {
            method: method.to_string(),
        })?;

    let raw = receipt
        .get("descriptor")
        .and_then(|d| d.get("paraId").or_else(|| d.get("para_id")))
        .ok_or_else(|| ExtractionError::MissingParaId {
            method: method.to_string(),
        })?;

    raw.as_u64()
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
        .and_then(|id| u32::try_from(id).ok())
        .map(ParaId)
        .ok_or_else(|| ExtractionError::InvalidParaId {
            method: method.to_string(),
            value: raw.to_string(),
        })
}
