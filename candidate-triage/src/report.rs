// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hiccup reporting sinks

use crate::types::BlockHiccups;
use tracing::warn;

/// Receives one report per block that had at least one hiccup
pub trait HiccupReporter: Send + Sync {
    fn report(&self, block: &BlockHiccups);
}

/// Writes hiccups to the log, one line per hiccup with structured fields
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl HiccupReporter for TracingReporter {
    fn report(&self, block: &BlockHiccups) {
        warn!(
            height = block.height,
            count = block.len(),
            "[Triage] Block {} had {} hiccups",
            block.height,
            block.len()
        );

        for hiccup in &block.hiccups {
            warn!(
                height = block.height,
                para_id = hiccup.para_id.0,
                trigger_kind = %hiccup.trigger.kind,
                trigger_height = hiccup.trigger.height,
                previous_kind = %hiccup.previous.kind,
                previous_height = hiccup.previous.height,
                expected_kind = %hiccup.expected_kind(),
                gap = hiccup.gap(),
                reason = hiccup.reason().as_str(),
                "[Triage]   {}",
                hiccup
            );
        }
    }
}
