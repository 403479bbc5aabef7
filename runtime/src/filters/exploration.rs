// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filter-driven product exploration.
//!
//! Each filter candidate runs through
//! `Idle → Applying → Active | Inactive → Capturing → Removing → Idle`.
//! Products captured along the way are merged by canonical URL, so a product
//! surfacing under several filters is reported once with every filter label.

use super::discovery::{
    is_active, resolve_label, DiscoveryStats, FilterDiscoveryEngine, BUTTON_SELECTOR,
    CONTROL_ATTRS, INPUT_SELECTOR, MAX_ELEMENTS,
};
use super::product::{
    best_title, parse_price, AccumulatorStats, DiscoveredProduct, ProductAccumulator,
    ProductSighting,
};
use super::scoring::strip_count_suffix;
use super::{ElementKind, FilterCandidate};
use crate::budget::Deadline;
use crate::canonical::{key_or_raw, Canonicalizer, TrackingParamCanonicalizer};
use crate::config::ExplorationConfig;
use crate::crawl::{UrlClass, UrlClassifier};
use crate::dom::DomQuery;
use crate::error::EngineError;
use crate::renderer::{RenderContext, WaitPolicy};
use crate::taxonomy::slug::slugify;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a candidate is in its apply/capture/remove cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPhase {
    Idle,
    Applying,
    Active,
    Inactive,
    Capturing,
    Removing,
}

/// Final state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState {
    Captured,
    Inactive,
    Failed,
}

/// How activation was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    UrlChange,
    DomState,
}

/// How the page got back to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    /// The same element was clicked again.
    Clicked,
    /// The element had been replaced and was found again by label.
    Relocated,
    /// The baseline URL was reloaded.
    NavigatedBack,
    Failed,
}

/// What happened to one filter candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPath {
    pub filter: String,
    pub selector: String,
    pub state: FilterState,
    pub activation: Option<Activation>,
    /// Page URL while the filter was applied.
    pub active_url: Option<String>,
    pub products_found: usize,
    pub new_products: usize,
    pub removal: Option<Removal>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl FilterPath {
    fn new(candidate: &FilterCandidate) -> Self {
        Self {
            filter: candidate.display_label(),
            selector: candidate.selector.clone(),
            state: FilterState::Inactive,
            activation: None,
            active_url: None,
            products_found: 0,
            new_products: 0,
            removal: None,
            error: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorationStats {
    pub candidates: usize,
    pub captured: usize,
    pub inactive: usize,
    pub failed: usize,
    pub removal_failures: usize,
    pub baseline_products: usize,
    pub products: usize,
    pub sightings: usize,
    pub merged: usize,
    pub canonical_collisions: usize,
    pub canonical_fallbacks: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryExploration {
    pub category_url: String,
    pub category_name: String,
    pub baseline_url: String,
    pub products: Vec<DiscoveredProduct>,
    pub filter_paths: Vec<FilterPath>,
    pub discovery: DiscoveryStats,
    pub stats: ExplorationStats,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

pub struct FilterExplorationEngine {
    config: ExplorationConfig,
    discovery: FilterDiscoveryEngine,
    classifier: UrlClassifier,
    canonicalizer: Arc<dyn Canonicalizer>,
}

impl FilterExplorationEngine {
    pub fn new(config: ExplorationConfig, discovery: FilterDiscoveryEngine) -> Self {
        Self {
            config,
            discovery,
            classifier: UrlClassifier::new(false),
            canonicalizer: Arc::new(TrackingParamCanonicalizer),
        }
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn with_classifier(mut self, classifier: UrlClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Load `category_url`, discover its filters and cycle through them.
    ///
    /// Only a failed initial navigation is an `Err`; everything after that
    /// degrades into the returned paths and counters.
    pub async fn explore_category(
        &self,
        ctx: &mut dyn RenderContext,
        category_url: &str,
        category_name: &str,
        deadline: Deadline,
    ) -> Result<CategoryExploration> {
        let started = Instant::now();
        let started_at = Utc::now();
        ctx.navigate(category_url, WaitPolicy::Load, self.config.navigation_timeout_ms)
            .await
            .map_err(|e| EngineError::Navigation {
                url: category_url.to_string(),
                reason: e.to_string(),
            })?;
        let baseline_url = ctx
            .get_url()
            .await
            .unwrap_or_else(|_| category_url.to_string());
        info!(category = category_name, url = %baseline_url, "exploring category");

        let mut products = ProductAccumulator::new();
        let mut stats = ExplorationStats::default();

        match self.capture(&*ctx, &baseline_url).await {
            Ok(sightings) => {
                for s in sightings {
                    if products.record(self.canonicalizer.as_ref(), s, None) {
                        stats.baseline_products += 1;
                    }
                }
            }
            Err(e) => warn!(url = %baseline_url, error = %e, "baseline capture failed"),
        }

        let discovery = match self.discovery.discover(&*ctx, &baseline_url).await {
            Ok(d) => d,
            Err(e) => {
                warn!(url = %baseline_url, error = %e, "filter discovery failed");
                super::DiscoveryResult {
                    page_url: baseline_url.clone(),
                    candidates: Vec::new(),
                    stats: DiscoveryStats::default(),
                }
            }
        };
        stats.candidates = discovery.candidates.len();

        let mut filter_paths = Vec::with_capacity(discovery.candidates.len());
        let mut cancelled = false;
        for candidate in &discovery.candidates {
            if deadline.is_expired() {
                warn!(category = category_name, "deadline expired, stopping filter exploration");
                cancelled = true;
                break;
            }
            let path = self
                .run_candidate(ctx, candidate, &baseline_url, &mut products)
                .await;
            match path.state {
                FilterState::Captured => stats.captured += 1,
                FilterState::Inactive => stats.inactive += 1,
                FilterState::Failed => stats.failed += 1,
            }
            if path.removal == Some(Removal::Failed) {
                stats.removal_failures += 1;
            }
            filter_paths.push(path);
        }

        let AccumulatorStats {
            sightings,
            merged,
            canonical_collisions,
            canonical_fallbacks,
        } = products.stats();
        stats.sightings = sightings;
        stats.merged = merged;
        stats.canonical_collisions = canonical_collisions;
        stats.canonical_fallbacks = canonical_fallbacks;
        stats.products = products.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            category = category_name,
            products = stats.products,
            filters = stats.captured,
            inactive = stats.inactive,
            collisions = stats.canonical_collisions,
            "category exploration complete"
        );
        Ok(CategoryExploration {
            category_url: category_url.to_string(),
            category_name: category_name.to_string(),
            baseline_url,
            products: products.into_products(),
            filter_paths,
            discovery: discovery.stats,
            stats,
            cancelled,
            started_at,
        })
    }

    /// One pass of the candidate state machine. Always ends in `Idle`.
    async fn run_candidate(
        &self,
        ctx: &mut dyn RenderContext,
        candidate: &FilterCandidate,
        baseline_url: &str,
        products: &mut ProductAccumulator,
    ) -> FilterPath {
        let started = Instant::now();
        let mut path = FilterPath::new(candidate);
        let mut phase = FilterPhase::Idle;
        let mut before_url = baseline_url.to_string();
        let mut active_url = String::new();

        loop {
            debug!(filter = %path.filter, ?phase, "filter phase");
            phase = match phase {
                FilterPhase::Idle if path.activation.is_some() || path.error.is_some() => break,
                FilterPhase::Idle if candidate.active => {
                    path.error = Some("already active on baseline".into());
                    break;
                }
                FilterPhase::Idle => FilterPhase::Applying,

                FilterPhase::Applying => {
                    before_url = ctx.get_url().await.unwrap_or_else(|_| baseline_url.to_string());
                    let clicked = ctx
                        .click(&candidate.selector, self.config.action_timeout_ms)
                        .await;
                    if let Err(e) = clicked {
                        warn!(filter = %path.filter, error = %e, "failed to apply filter");
                        path.state = FilterState::Failed;
                        path.error = Some(e.to_string());
                        self.restore_baseline(ctx, baseline_url).await;
                        break;
                    }
                    self.settle(self.config.apply_settle_ms).await;
                    active_url = ctx.get_url().await.unwrap_or_else(|_| before_url.clone());

                    let url_marker = active_url != before_url
                        && self.url_has_filter_marker(&active_url, candidate);
                    if url_marker {
                        path.activation = Some(Activation::UrlChange);
                        FilterPhase::Active
                    } else if self.dom_active(&*ctx, candidate).await {
                        path.activation = Some(Activation::DomState);
                        FilterPhase::Active
                    } else {
                        FilterPhase::Inactive
                    }
                }

                FilterPhase::Inactive => {
                    debug!(filter = %path.filter, "filter did not activate, skipping");
                    path.state = FilterState::Inactive;
                    path.error = Some("filter did not activate".into());
                    if active_url != before_url {
                        self.restore_baseline(ctx, baseline_url).await;
                    }
                    FilterPhase::Idle
                }

                FilterPhase::Active => {
                    path.active_url = Some(active_url.clone());
                    FilterPhase::Capturing
                }

                FilterPhase::Capturing => {
                    match self.capture(&*ctx, &active_url).await {
                        Ok(sightings) => {
                            path.products_found = sightings.len();
                            let filter = Some(path.filter.as_str());
                            for s in sightings {
                                if products.record(self.canonicalizer.as_ref(), s, filter) {
                                    path.new_products += 1;
                                }
                            }
                            path.state = FilterState::Captured;
                        }
                        Err(e) => {
                            warn!(filter = %path.filter, error = %e, "product capture failed");
                            path.state = FilterState::Failed;
                            path.error = Some(e.to_string());
                        }
                    }
                    FilterPhase::Removing
                }

                FilterPhase::Removing => {
                    path.removal = Some(self.remove(ctx, candidate, baseline_url).await);
                    FilterPhase::Idle
                }
            };
        }

        path.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            filter = %path.filter,
            state = ?path.state,
            products = path.products_found,
            new = path.new_products,
            "filter done"
        );
        path
    }

    /// Click the filter again, then make sure the page is back at baseline.
    async fn remove(
        &self,
        ctx: &mut dyn RenderContext,
        candidate: &FilterCandidate,
        baseline_url: &str,
    ) -> Removal {
        let clicked = self.relocate_and_click(&*ctx, candidate).await;
        if clicked.is_none() {
            warn!(filter = %candidate.label, "could not re-locate filter to remove it");
        }
        self.settle(self.config.remove_settle_ms).await;

        let current = ctx.get_url().await.unwrap_or_default();
        let at_baseline = self.same_page(&current, baseline_url);
        let still_active = at_baseline && self.dom_active(&*ctx, candidate).await;

        match clicked {
            Some(how) if at_baseline && !still_active => how,
            _ => {
                if self.restore_baseline(ctx, baseline_url).await {
                    Removal::NavigatedBack
                } else {
                    Removal::Failed
                }
            }
        }
    }

    async fn relocate_and_click(
        &self,
        ctx: &dyn RenderContext,
        candidate: &FilterCandidate,
    ) -> Option<Removal> {
        let kind = candidate.element_type;
        let label = candidate.display_label();
        let found = ctx
            .query(&control_query(&candidate.selector, kind).limit(1))
            .await
            .unwrap_or_default();
        let same = found.first().is_some_and(|el| {
            let l = strip_count_suffix(&resolve_label(el));
            l.is_empty() || l == label
        });
        if same
            && ctx
                .click(&candidate.selector, self.config.action_timeout_ms)
                .await
                .is_ok()
        {
            return Some(Removal::Clicked);
        }

        // The element was re-rendered: find a control of the same kind and label.
        let selector = match kind {
            ElementKind::Checkbox | ElementKind::Radio => INPUT_SELECTOR,
            ElementKind::Button => BUTTON_SELECTOR,
            ElementKind::Link => "a[href]",
        };
        let controls = ctx
            .query(&control_query(selector, kind).limit(MAX_ELEMENTS))
            .await
            .unwrap_or_default();
        let replacement = controls
            .iter()
            .find(|el| strip_count_suffix(&resolve_label(el)) == label)?;
        ctx.click(&replacement.selector(), self.config.action_timeout_ms)
            .await
            .ok()
            .map(|_| Removal::Relocated)
    }

    /// Navigate back to the baseline page unless already there.
    async fn restore_baseline(&self, ctx: &mut dyn RenderContext, baseline_url: &str) -> bool {
        if let Ok(current) = ctx.get_url().await {
            if current == baseline_url {
                return true;
            }
        }
        match ctx
            .navigate(baseline_url, WaitPolicy::Load, self.config.navigation_timeout_ms)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(url = baseline_url, error = %e, "failed to restore baseline page");
                false
            }
        }
    }

    async fn dom_active(&self, ctx: &dyn RenderContext, candidate: &FilterCandidate) -> bool {
        ctx.query(&DomQuery::new(&candidate.selector).attrs(CONTROL_ATTRS).limit(1))
            .await
            .ok()
            .and_then(|found| found.into_iter().next())
            .is_some_and(|el| is_active(&el))
    }

    fn url_has_filter_marker(&self, url: &str, candidate: &FilterCandidate) -> bool {
        if self.discovery.vocabulary().has_facet_params(url) {
            return true;
        }
        let lower = url.to_ascii_lowercase();
        let label_slug = slugify(&candidate.display_label());
        let value = candidate.value.as_deref().map(str::to_ascii_lowercase);
        (label_slug.len() >= 2 && lower.contains(&label_slug))
            || value.is_some_and(|v| v.len() >= 2 && lower.contains(&v))
    }

    fn same_page(&self, a: &str, b: &str) -> bool {
        key_or_raw(self.canonicalizer.as_ref(), a).0 == key_or_raw(self.canonicalizer.as_ref(), b).0
    }

    async fn settle(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Product anchors on the current page, one sighting per URL.
    async fn capture(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
    ) -> Result<Vec<ProductSighting>> {
        let anchors = ctx
            .query(
                &DomQuery::new("a[href]")
                    .attrs(&["title", "aria-label"])
                    .with_card_context()
                    .limit(self.config.max_products_per_filter.saturating_mul(4).max(1)),
            )
            .await?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, (Vec<String>, Option<String>, Option<String>)> =
            HashMap::new();
        for a in &anchors {
            let Some(href) = a.href.as_deref() else {
                continue;
            };
            let card = a.card.as_ref();
            let priced = card.is_some_and(|c| c.price_text.is_some());
            let class = self.classifier.classify(href, page_url);
            let priced_listing =
                priced && !matches!(class, UrlClass::Excluded | UrlClass::Category);
            if class != UrlClass::Product && !priced_listing {
                continue;
            }

            let entry = grouped.entry(href.to_string()).or_insert_with(|| {
                order.push(href.to_string());
                (Vec::new(), None, None)
            });
            entry.0.push(a.text.clone());
            entry.0.extend(a.attr("title").map(String::from));
            entry.0.extend(a.attr("aria-label").map(String::from));
            if let Some(card) = card {
                entry.0.extend(card.texts.iter().cloned());
                if entry.1.is_none() {
                    entry.1 = card.price_text.clone();
                }
                if entry.2.is_none() {
                    entry.2 = card.image.as_deref().and_then(|i| resolve_url(page_url, i));
                }
            }
        }

        Ok(order
            .into_iter()
            .take(self.config.max_products_per_filter)
            .filter_map(|url| {
                let (texts, price, image) = grouped.remove(&url)?;
                Some(ProductSighting {
                    title: best_title(
                        texts.iter().map(String::as_str),
                        self.config.title_min_len,
                        self.config.title_max_len,
                    )
                    .unwrap_or_default(),
                    price: price.as_deref().and_then(parse_price),
                    image,
                    url,
                })
            })
            .collect())
    }
}

/// Inputs are labelled through `<label>` hints; other controls by their own text.
fn control_query(selector: &str, kind: ElementKind) -> DomQuery {
    let query = DomQuery::new(selector).attrs(CONTROL_ATTRS);
    match kind {
        ElementKind::Checkbox | ElementKind::Radio => query.with_label_hints(),
        ElementKind::Button | ElementKind::Link => query,
    }
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") {
        return None;
    }
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterDiscoveryConfig;
    use crate::filters::FilterVocabulary;
    use crate::renderer::fixture::{FixturePage, FixtureSite};

    fn engine() -> FilterExplorationEngine {
        FilterExplorationEngine::new(
            ExplorationConfig {
                apply_settle_ms: 0,
                remove_settle_ms: 0,
                ..Default::default()
            },
            FilterDiscoveryEngine::new(
                FilterDiscoveryConfig {
                    open_settle_ms: 0,
                    ..Default::default()
                },
                FilterVocabulary::builtin(),
            ),
        )
    }

    const CHECKBOX_LISTING: &str = r#"<html><body>
        <form class="filter-form">
          <label for="f-wool">Wool (3)</label><input type="checkbox" id="f-wool" name="material" value="wool">
          <label for="f-silk">Silk (1)</label><input type="checkbox" id="f-silk" name="material" value="silk" checked>
        </form>
        <ul class="grid">
          <li class="product-card"><a href="/product/scarf-1"><img src="/img/1.jpg" alt="Wool Scarf Grey">
            <h3>Wool Scarf</h3></a><span class="price">$25.00</span></li>
        </ul>
        </body></html>"#;

    #[tokio::test]
    async fn test_dom_activated_filter_is_captured_and_removed() {
        let site = FixtureSite::new().page("https://shop.test/c/scarves", CHECKBOX_LISTING);
        let mut page = FixturePage::new(site);
        let result = engine()
            .explore_category(&mut page, "https://shop.test/c/scarves", "Scarves", Deadline::none())
            .await
            .unwrap();

        assert_eq!(result.stats.candidates, 2);
        let path = |name: &str| {
            result
                .filter_paths
                .iter()
                .find(|p| p.filter == name)
                .unwrap()
                .clone()
        };
        let wool = path("Wool");
        assert_eq!(wool.state, FilterState::Captured);
        assert_eq!(wool.activation, Some(Activation::DomState));
        assert_eq!(wool.removal, Some(Removal::Clicked));

        let silk = path("Silk");
        assert_eq!(silk.state, FilterState::Inactive);
        assert_eq!(silk.error.as_deref(), Some("already active on baseline"));

        assert_eq!(result.products.len(), 1);
        let scarf = &result.products[0];
        assert_eq!(scarf.title, "Wool Scarf Grey");
        assert_eq!(scarf.price.as_ref().map(|p| p.amount), Some(25.0));
        assert_eq!(scarf.image.as_deref(), Some("https://shop.test/img/1.jpg"));
        assert_eq!(scarf.filters_applied_when_seen, vec!["Wool"]);
    }

    #[tokio::test]
    async fn test_unknown_category_is_navigation_error() {
        let mut page = FixturePage::new(FixtureSite::new());
        let err = engine()
            .explore_category(&mut page, "https://shop.test/c/none", "None", Deadline::none())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("navigation to https://shop.test/c/none failed"));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://shop.test/c/x", "/img/a.png").as_deref(),
            Some("https://shop.test/img/a.png")
        );
        assert_eq!(resolve_url("https://shop.test/", "data:image/png;base64,xx"), None);
    }
}
