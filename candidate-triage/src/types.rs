// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Candidate lifecycle types shared by the tracker, the extractor and the reporters

use crate::error::TriageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parachain id of a tracked work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParaId(pub u32);

impl fmt::Display for ParaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ParaId {
    fn from(id: u32) -> Self {
        ParaId(id)
    }
}

/// Lifecycle milestone of a candidate. A para is expected to go
/// `Backed -> Included -> Backed -> ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Backed,
    Included,
}

impl EventKind {
    /// The kind that must follow `self`
    pub fn opposite(self) -> Self {
        match self {
            EventKind::Backed => EventKind::Included,
            EventKind::Included => EventKind::Backed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Backed => "backed",
            EventKind::Included => "included",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backed" => Ok(EventKind::Backed),
            "included" => Ok(EventKind::Included),
            other => Err(TriageError::InvalidEventKind(other.to_string())),
        }
    }
}

/// Maps a textual kind to the kind expected after it.
///
/// Fails with [`TriageError::InvalidEventKind`] for anything but `backed` / `included`.
pub fn opposite_kind(name: &str) -> Result<EventKind, TriageError> {
    Ok(name.parse::<EventKind>()?.opposite())
}

/// A milestone seen at a given relay-chain height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub height: u64,
    pub kind: EventKind,
}

impl ObservedEvent {
    pub fn new(height: u64, kind: EventKind) -> Self {
        Self { height, kind }
    }
}

impl fmt::Display for ObservedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.height)
    }
}

/// Domain event produced by an [`crate::extractor::EventExtractor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateEvent {
    pub para_id: ParaId,
    pub kind: EventKind,
}

/// Why a hiccup was raised. Derived for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiccupReason {
    /// The same milestone was seen twice in a row
    UnexpectedKind,
    /// The milestone alternated correctly but not on the next block
    Gap,
}

impl HiccupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HiccupReason::UnexpectedKind => "unexpected_kind",
            HiccupReason::Gap => "gap",
        }
    }
}

/// Alternation violation for a single para
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hiccup {
    pub para_id: ParaId,
    pub trigger: ObservedEvent,
    pub previous: ObservedEvent,
}

impl Hiccup {
    /// Blocks between the previous milestone and the trigger
    pub fn gap(&self) -> u64 {
        self.trigger.height.saturating_sub(self.previous.height)
    }

    pub fn expected_kind(&self) -> EventKind {
        self.previous.kind.opposite()
    }

    pub fn reason(&self) -> HiccupReason {
        if self.trigger.kind != self.expected_kind() {
            HiccupReason::UnexpectedKind
        } else {
            HiccupReason::Gap
        }
    }
}

impl fmt::Display for Hiccup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id({}): {} while last event was {} at {} ({} blocks stall)",
            self.para_id,
            self.trigger.kind,
            self.previous.kind,
            self.previous.height,
            self.gap()
        )
    }
}

/// All hiccups raised while replaying one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHiccups {
    pub height: u64,
    pub hiccups: Vec<Hiccup>,
}

impl BlockHiccups {
    pub fn len(&self) -> usize {
        self.hiccups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hiccups.is_empty()
    }
}
