// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filter candidate discovery.
//!
//! Opens the filter UI when it is collapsed, scopes the scan to filter
//! containers, collects checkbox/radio inputs, buttons and facet links, then
//! hands the raw candidates to [`scoring`](super::scoring) for ranking and
//! exclusion.

use super::scoring::{apply_exclusions, rank};
use super::{ElementKind, FilterCandidate, FilterVocabulary};
use crate::config::FilterDiscoveryConfig;
use crate::dom::{DomQuery, ElementSnapshot};
use crate::renderer::RenderContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub(super) const INPUT_SELECTOR: &str = r#"input[type="checkbox"], input[type="radio"]"#;
pub(super) const BUTTON_SELECTOR: &str = r#"button, [role="button"], [role="checkbox"], [role="radio"], [role="option"]"#;
const OPEN_TEXT_SELECTOR: &str = r#"button, [role="button"], a, summary"#;
pub(super) const CONTROL_ATTRS: &[&str] = &[
    "name",
    "value",
    "type",
    "role",
    "aria-label",
    "aria-pressed",
    "aria-checked",
    "aria-selected",
    "data-value",
    "data-filter",
];
pub(super) const MAX_ELEMENTS: usize = 600;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    /// Selector of the control clicked to open the filter UI.
    pub opened_with: Option<String>,
    pub containers_found: usize,
    pub whole_document_scan: bool,
    pub raw_candidates: usize,
    pub below_threshold: usize,
    pub hidden: usize,
    pub excluded: usize,
    /// Exclusion would have removed every candidate and was skipped.
    pub exclusion_fallback: bool,
    pub truncated: usize,
    pub returned: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub page_url: String,
    pub candidates: Vec<FilterCandidate>,
    pub stats: DiscoveryStats,
}

pub struct FilterDiscoveryEngine {
    config: FilterDiscoveryConfig,
    vocabulary: FilterVocabulary,
}

impl FilterDiscoveryEngine {
    pub fn new(config: FilterDiscoveryConfig, vocabulary: FilterVocabulary) -> Self {
        Self { config, vocabulary }
    }

    pub fn vocabulary(&self) -> &FilterVocabulary {
        &self.vocabulary
    }

    /// Discover ranked filter candidates on the current page.
    pub async fn discover(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
    ) -> Result<DiscoveryResult> {
        let started = Instant::now();
        let mut stats = DiscoveryStats {
            opened_with: self.open_filters(ctx).await,
            ..Default::default()
        };

        let containers = self.find_containers(ctx).await?;
        stats.containers_found = containers.len();
        stats.whole_document_scan = containers.is_empty();

        let raw = if containers.is_empty() {
            debug!(url = page_url, "no filter container, scanning whole document");
            self.collect(ctx, None).await?
        } else {
            let mut raw = Vec::new();
            for container in &containers {
                raw.extend(self.collect(ctx, Some(container)).await?);
            }
            raw
        };
        let raw = dedup_by_selector(raw);
        stats.raw_candidates = raw.len();

        let (ranked, rank_stats) = rank(
            raw,
            &self.vocabulary,
            self.config.score_threshold,
            self.config.include_hidden,
        );
        stats.below_threshold = rank_stats.below_threshold;
        stats.hidden = rank_stats.hidden;

        let outcome = apply_exclusions(ranked, &self.vocabulary);
        if outcome.fallback_used {
            warn!(
                url = page_url,
                excluded = outcome.excluded.len(),
                "exclusion rules matched every candidate, keeping them all"
            );
        } else {
            stats.excluded = outcome.excluded.len();
        }
        stats.exclusion_fallback = outcome.fallback_used;

        let mut candidates = outcome.kept;
        stats.truncated = candidates.len().saturating_sub(self.config.max_filters);
        candidates.truncate(self.config.max_filters);
        stats.returned = candidates.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            url = page_url,
            raw = stats.raw_candidates,
            returned = stats.returned,
            excluded = stats.excluded,
            "filter discovery complete"
        );
        Ok(DiscoveryResult {
            page_url: page_url.to_string(),
            candidates,
            stats,
        })
    }

    /// Click the first visible "open filters" control, if any.
    async fn open_filters(&self, ctx: &dyn RenderContext) -> Option<String> {
        let mut target = None;
        for selector in &self.vocabulary.open_filters {
            match ctx.query(&DomQuery::new(selector).limit(5)).await {
                Ok(found) => {
                    if let Some(el) = found.iter().find(|e| e.is_visible()) {
                        target = Some(el.selector());
                        break;
                    }
                }
                Err(e) => debug!(selector = %selector, error = %e, "open-filters selector failed"),
            }
        }
        if target.is_none() {
            let controls = ctx
                .query(
                    &DomQuery::new(OPEN_TEXT_SELECTOR)
                        .attrs(&["aria-label"])
                        .limit(MAX_ELEMENTS),
                )
                .await
                .unwrap_or_default();
            target = controls
                .iter()
                .filter(|e| e.is_visible())
                .find(|e| {
                    self.vocabulary.open_filter_text.is_match(&e.text)
                        || e.attr("aria-label")
                            .is_some_and(|l| self.vocabulary.open_filter_text.is_match(l))
                })
                .map(ElementSnapshot::selector);
        }

        let selector = target?;
        match ctx.click(&selector, self.config.action_timeout_ms).await {
            Ok(()) => {
                debug!(selector = %selector, "opened filter panel");
                tokio::time::sleep(Duration::from_millis(self.config.open_settle_ms)).await;
                Some(selector)
            }
            Err(e) => {
                debug!(selector = %selector, error = %e, "failed to open filter panel");
                None
            }
        }
    }

    /// Structural selectors of filter containers, outermost only.
    async fn find_containers(&self, ctx: &dyn RenderContext) -> Result<Vec<String>> {
        let mut found: Vec<ElementSnapshot> = Vec::new();
        for selector in &self.vocabulary.containers {
            match ctx.query(&DomQuery::new(selector).limit(50)).await {
                Ok(els) => found.extend(els.into_iter().filter(|e| {
                    !is_control(e) && (self.config.include_hidden || e.is_visible())
                })),
                Err(e) => debug!(selector = %selector, error = %e, "container selector failed"),
            }
        }

        // Drop containers nested inside another one.
        let paths: Vec<_> = found.iter().map(|e| e.ancestry.clone()).collect();
        let mut selectors = Vec::new();
        let mut seen = HashSet::new();
        for (i, el) in found.iter().enumerate() {
            let nested = paths.iter().enumerate().any(|(j, other)| {
                j != i && other.len() < el.ancestry.len() && el.ancestry.starts_with(other)
            });
            let selector = el.selector();
            if !nested && seen.insert(selector.clone()) {
                selectors.push(selector);
            }
        }
        Ok(selectors)
    }

    async fn collect(
        &self,
        ctx: &dyn RenderContext,
        container: Option<&String>,
    ) -> Result<Vec<FilterCandidate>> {
        let scoped = |q: DomQuery| match container {
            Some(c) => q.within(c.as_str()),
            None => q,
        };
        let mut out = Vec::new();

        let inputs = ctx
            .query(&scoped(
                DomQuery::new(INPUT_SELECTOR)
                    .attrs(CONTROL_ATTRS)
                    .with_label_hints()
                    .limit(MAX_ELEMENTS),
            ))
            .await?;
        for el in inputs {
            let kind = match el.attr("type").map(str::to_ascii_lowercase).as_deref() {
                Some("radio") => ElementKind::Radio,
                _ => ElementKind::Checkbox,
            };
            out.push(self.candidate(&el, kind, container, false));
        }

        let buttons = ctx
            .query(&scoped(
                DomQuery::new(BUTTON_SELECTOR).attrs(CONTROL_ATTRS).limit(MAX_ELEMENTS),
            ))
            .await?;
        for el in buttons {
            if el.text.is_empty() && el.attr("aria-label").is_none() {
                continue;
            }
            out.push(self.candidate(&el, ElementKind::Button, container, false));
        }

        let links = ctx
            .query(&scoped(
                DomQuery::new("a[href]").attrs(CONTROL_ATTRS).limit(MAX_ELEMENTS),
            ))
            .await?;
        for el in links {
            let facet = el
                .href
                .as_deref()
                .is_some_and(|h| self.vocabulary.has_facet_params(h));
            // Outside a container only facet links are worth keeping.
            if el.text.is_empty() || (container.is_none() && !facet) {
                continue;
            }
            out.push(self.candidate(&el, ElementKind::Link, container, facet));
        }
        Ok(out)
    }

    fn candidate(
        &self,
        el: &ElementSnapshot,
        kind: ElementKind,
        container: Option<&String>,
        facet_link: bool,
    ) -> FilterCandidate {
        FilterCandidate {
            element_type: kind,
            selector: el.selector(),
            label: resolve_label(el),
            name: el.attr("name").map(String::from),
            value: el
                .attr("value")
                .or_else(|| el.attr("data-value"))
                .or_else(|| el.attr("data-filter"))
                .map(String::from),
            href: el.href.clone(),
            active: is_active(el),
            container_hint: container.cloned(),
            facet_link,
            visible: el.is_visible(),
            score: 0,
        }
    }
}

/// `label[for]` → enclosing `<label>` → sibling text → own text →
/// `aria-label` → value → name.
pub fn resolve_label(el: &ElementSnapshot) -> String {
    let hints = el.label_hints.clone().unwrap_or_default();
    hints
        .label_for
        .or(hints.enclosing_label)
        .or(hints.sibling_text)
        .or_else(|| (!el.text.is_empty()).then(|| el.text.clone()))
        .or_else(|| el.attr("aria-label").map(String::from))
        .or_else(|| el.attr("value").map(String::from))
        .or_else(|| el.attr("data-value").map(String::from))
        .or_else(|| el.attr("name").map(String::from))
        .unwrap_or_default()
}

/// Checked, pressed, selected, or styled as active.
pub fn is_active(el: &ElementSnapshot) -> bool {
    el.checked
        || ["aria-pressed", "aria-checked", "aria-selected"]
            .iter()
            .any(|a| el.attr(a) == Some("true"))
        || el
            .classes()
            .any(|c| {
                matches!(
                    c,
                    "active" | "selected" | "is-active" | "is-selected" | "is-checked" | "checked"
                )
            })
}

/// Buttons and inputs whose class happens to mention "filter" are not
/// containers.
fn is_control(el: &ElementSnapshot) -> bool {
    matches!(
        el.tag.as_str(),
        "button" | "a" | "input" | "label" | "select" | "option" | "summary"
    )
}

fn dedup_by_selector(raw: Vec<FilterCandidate>) -> Vec<FilterCandidate> {
    let mut seen = HashSet::new();
    raw.into_iter().filter(|c| seen.insert(c.selector.clone())).collect()
}
