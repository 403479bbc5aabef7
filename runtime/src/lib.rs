// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aisle runtime library: resilient menu extraction, filter discovery and
//! exploration, subcategory crawling and category deduplication for retail
//! sites.
//!
//! Every engine drives a page through [`renderer::RenderContext`] and keeps
//! going when individual items fail. Failures are recorded in the results
//! instead of aborting the run.

#![allow(clippy::new_without_default, clippy::should_implement_trait)]

pub mod budget;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod dom;
pub mod error;
pub mod filters;
pub mod navigation;
pub mod renderer;
pub mod taxonomy;
