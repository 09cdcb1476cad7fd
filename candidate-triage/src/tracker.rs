// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-para sequence tracking
//!
//! Remembers the last milestone seen for every para and checks that each new
//! one is the opposite kind, exactly one block later. Violations are returned
//! as [`Hiccup`]s; they never stop the tracker from advancing.

use crate::error::TriageResult;
use crate::types::{EventKind, Hiccup, ObservedEvent, ParaId};
use std::collections::HashMap;

/// Last observed milestone per para
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    last_events: HashMap<ParaId, ObservedEvent>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            last_events: HashMap::new(),
        }
    }

    /// Record `observed` for `para_id` and return a hiccup if it breaks the alternation.
    ///
    /// The stored entry is replaced by `observed` whether or not a hiccup is raised.
    pub fn record_event(&mut self, para_id: ParaId, observed: ObservedEvent) -> Option<Hiccup> {
        let hiccup = self.last_events.get(&para_id).and_then(|previous| {
            let expected = previous.kind.opposite();
            let next_block = previous.height.checked_add(1);
            if observed.kind == expected && Some(observed.height) == next_block {
                None
            } else {
                Some(Hiccup {
                    para_id,
                    trigger: observed,
                    previous: *previous,
                })
            }
        });

        self.last_events.insert(para_id, observed);
        hiccup
    }

    /// Like [`Self::record_event`], for a kind given by name.
    ///
    /// An unknown kind is rejected before the state is touched.
    pub fn record_named(
        &mut self,
        para_id: ParaId,
        height: u64,
        kind: &str,
    ) -> TriageResult<Option<Hiccup>> {
        let kind: EventKind = kind.parse()?;
        Ok(self.record_event(para_id, ObservedEvent::new(height, kind)))
    }

    pub fn last_event(&self, para_id: ParaId) -> Option<&ObservedEvent> {
        self.last_events.get(&para_id)
    }

    pub fn len(&self) -> usize {
        self.last_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParaId, &ObservedEvent)> {
        self.last_events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;
    use crate::types::HiccupReason;
    use EventKind::{Backed, Included};

    fn ev(height: u64, kind: EventKind) -> ObservedEvent {
        ObservedEvent::new(height, kind)
    }

    #[test]
    fn test_first_event_never_hiccups() {
        let mut state = TrackerState::new();
        assert!(state.record_event(ParaId(1), ev(50, Included)).is_none());
        assert!(state.record_event(ParaId(2), ev(50, Backed)).is_none());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_clean_alternation() {
        // Scenario A
        let mut state = TrackerState::new();
        let para = ParaId(5);
        assert!(state.record_event(para, ev(10, Backed)).is_none());
        assert!(state.record_event(para, ev(11, Included)).is_none());
        assert!(state.record_event(para, ev(12, Backed)).is_none());

        assert_eq!(state.len(), 1);
        assert_eq!(state.last_event(para), Some(&ev(12, Backed)));
    }

    #[test]
    fn test_long_alternating_run_has_no_hiccups() {
        let mut state = TrackerState::new();
        let para = ParaId(2000);
        let mut kind = Backed;
        for height in 1_000..1_200 {
            assert!(state.record_event(para, ev(height, kind)).is_none());
            kind = kind.opposite();
        }
    }

    #[test]
    fn test_repeated_kind() {
        // Scenario B
        let mut state = TrackerState::new();
        let para = ParaId(5);
        state.record_event(para, ev(10, Backed));

        let hiccup = state.record_event(para, ev(11, Backed)).unwrap();
        assert_eq!(hiccup.para_id, para);
        assert_eq!(hiccup.trigger, ev(11, Backed));
        assert_eq!(hiccup.previous, ev(10, Backed));
        assert_eq!(hiccup.expected_kind(), Included);
        assert_eq!(hiccup.gap(), 1);
        assert_eq!(hiccup.reason(), HiccupReason::UnexpectedKind);
    }

    #[test]
    fn test_repeated_kind_hiccups_regardless_of_gap() {
        for gap in [0u64, 1, 2, 7, 100] {
            let mut state = TrackerState::new();
            state.record_event(ParaId(9), ev(10, Included));
            let hiccup = state.record_event(ParaId(9), ev(10 + gap, Included));
            assert!(hiccup.is_some(), "gap {} should hiccup", gap);
        }
    }

    #[test]
    fn test_stall() {
        // Scenario C
        let mut state = TrackerState::new();
        let para = ParaId(5);
        state.record_event(para, ev(10, Backed));

        let hiccup = state.record_event(para, ev(15, Included)).unwrap();
        assert_eq!(hiccup.gap(), 5);
        assert_eq!(hiccup.trigger.kind, hiccup.expected_kind());
        assert_eq!(hiccup.reason(), HiccupReason::Gap);
    }

    #[test]
    fn test_same_block_alternation_is_a_hiccup() {
        let mut state = TrackerState::new();
        state.record_event(ParaId(3), ev(20, Included));
        let hiccup = state.record_event(ParaId(3), ev(20, Backed)).unwrap();
        assert_eq!(hiccup.gap(), 0);
        assert_eq!(hiccup.reason(), HiccupReason::Gap);
    }

    #[test]
    fn test_state_advances_after_hiccup() {
        let mut state = TrackerState::new();
        let para = ParaId(5);
        state.record_event(para, ev(10, Backed));
        assert!(state.record_event(para, ev(11, Backed)).is_some());
        assert_eq!(state.last_event(para), Some(&ev(11, Backed)));

        // validated against the hiccup trigger, not the event before it
        assert!(state.record_event(para, ev(12, Included)).is_none());
    }

    #[test]
    fn test_paras_are_independent() {
        let mut state = TrackerState::new();
        state.record_event(ParaId(1), ev(10, Backed));
        state.record_event(ParaId(2), ev(10, Backed));
        assert!(state.record_event(ParaId(1), ev(11, Included)).is_none());
        assert!(state.record_event(ParaId(2), ev(11, Backed)).is_some());
    }

    #[test]
    fn test_record_is_deterministic() {
        let mut original = TrackerState::new();
        original.record_event(ParaId(5), ev(10, Backed));

        let mut first = original.clone();
        let mut second = original.clone();
        let a = first.record_event(ParaId(5), ev(13, Backed));
        let b = second.record_event(ParaId(5), ev(13, Backed));
        assert_eq!(a, b);
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_named() {
        let mut state = TrackerState::new();
        assert!(state.record_named(ParaId(5), 10, "backed").unwrap().is_none());
        let hiccup = state.record_named(ParaId(5), 11, "backed").unwrap();
        assert!(hiccup.is_some());
    }

    #[test]
    fn test_record_named_invalid_kind_leaves_state_untouched() {
        let mut state = TrackerState::new();
        state.record_event(ParaId(5), ev(10, Backed));
        let before = state.clone();

        let err = state.record_named(ParaId(5), 11, "timedout").unwrap_err();
        assert!(matches!(err, TriageError::InvalidEventKind(_)));
        assert_eq!(state, before);

        let err = state.record_named(ParaId(6), 11, "").unwrap_err();
        assert!(matches!(err, TriageError::InvalidEventKind(_)));
        assert!(state.last_event(ParaId(6)).is_none());
    }
}
