// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `aisle` binary.

pub mod crawl_cmd;
pub mod dedup_cmd;
pub mod explore_cmd;
pub mod filters_cmd;
pub mod nav_cmd;
pub mod output;
pub mod patterns_cmd;
pub mod session;

use crate::budget::Deadline;
use crate::config::EngineConfig;
use std::path::PathBuf;

/// Settings shared by every page-driving command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: EngineConfig,
    /// Replay saved HTML from this directory instead of launching Chromium.
    pub offline: Option<PathBuf>,
    pub deadline: Deadline,
}
