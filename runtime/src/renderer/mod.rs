// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page automation abstraction.
//!
//! Defines the `Renderer` and `RenderContext` traits that the discovery
//! engines drive. Two backends ship with the crate: headless Chromium via
//! chromiumoxide, and an offline fixture backend over saved HTML.

pub mod chromium;
pub mod fixture;

use crate::dom::{DomQuery, ElementSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a navigation landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// URL after redirects.
    pub final_url: String,
    /// Response status; backends that cannot see it report 200.
    pub status: u16,
    pub load_time_ms: u64,
}

/// When `navigate` considers the page ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Target state for `wait_for_selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    Attached,
    Visible,
    Hidden,
}

/// Owns the browser process and hands out tabs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh tab.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    async fn shutdown(&self) -> Result<()>;
    /// Tabs opened and not yet closed.
    fn active_contexts(&self) -> usize;
}

/// One exclusive page session.
///
/// Interaction is single-threaded by contract: callers hold the context for
/// the duration of a run and issue one action at a time, because hover and
/// visibility state is shared mutable UI state.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Load `url`, failing once `timeout_ms` elapses.
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<NavigationResult>;
    /// Evaluate a script and return its JSON result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Run a typed element query.
    async fn query(&self, query: &DomQuery) -> Result<Vec<ElementSnapshot>>;
    /// Hover the first element matching `selector`.
    async fn hover(&self, selector: &str, timeout_ms: u64) -> Result<()>;
    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<()>;
    /// Wait until an element matching `selector` reaches `state`.
    /// Returns `false` on timeout rather than erroring.
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> Result<bool>;
    /// Move the pointer to viewport coordinates.
    async fn mouse_move(&self, x: f64, y: f64) -> Result<()>;
    /// Set inline style declarations on every element matching `selector`.
    /// An empty value removes the property. Returns the number of elements touched.
    async fn set_style(&self, selector: &str, declarations: &[(String, String)]) -> Result<usize>;
    async fn get_url(&self) -> Result<String>;
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Build a declaration list from string pairs.
pub fn declarations(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
