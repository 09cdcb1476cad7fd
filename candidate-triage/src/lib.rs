// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod catch_up;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod finality;
pub mod metrics;
pub mod metrics_server;
pub mod report;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub mod test_utils;
