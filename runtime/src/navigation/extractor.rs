// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-pattern navigation extraction.
//!
//! Phase 1 finds the top-level menu entries for one [`NavigationPattern`].
//! Phase 2 reveals each entry's dropdown, one entry at a time: hover first,
//! force the panel visible if hovering showed nothing, and give up on the
//! entry when the race against the dropdown timeout is lost. Phase 3 tallies
//! the outcome.

use super::catalog::{InteractionType, NavigationPattern, PatternSelectors, DYNAMIC_DROPDOWN};
use crate::budget::Deadline;
use crate::config::NavigationConfig;
use crate::dom::{scoped, BoundingBox, DomQuery, ElementSnapshot};
use crate::error::EngineError;
use crate::renderer::{declarations, RenderContext, WaitState};
use crate::taxonomy::slug::slugify;
use anyhow::Result;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Panels a dynamic flyout may render into.
const FLYOUT_PANELS: &str = r#"[role="menu"], [data-flyout], [data-menu], [data-nav-flyout], [class*="flyout"], [class*="mega"], [class*="dropdown"], [class*="submenu"]"#;

/// Force-visibility strategies, tried in order.
const FORCE_STRATEGIES: &[(&str, &str)] = &[("display:block", "block"), ("display:flex", "flex")];

fn hamburger_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)hamburger|burger|menu-toggle|nav-toggle|navbar-toggler|mobile-menu|mobile-nav|menu-trigger|open menu|toggle navigation|offcanvas",
        )
        .expect("hamburger regex is valid")
    })
}

/// A top-level menu entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub text: String,
    pub href: Option<String>,
    pub index: usize,
    /// Selectors scoped to this entry, so each dropdown resolves on its own.
    pub selectors: PatternSelectors,
    pub bounding_box: Option<BoundingBox>,
    pub is_visible: bool,
}

/// A link found inside a revealed dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownLink {
    pub text: String,
    pub href: String,
    /// Nesting level inside the dropdown's lists, 0 for top-level columns.
    pub depth: usize,
}

/// How a dropdown was (or was not) revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealMethod {
    Hover,
    ForceVisibility,
    Timeout,
    Error,
}

impl RevealMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::ForceVisibility => "force-visibility",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

/// Tagged outcome of one dropdown reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum DropdownOutcome {
    Hover {
        items: Vec<DropdownLink>,
    },
    ForceVisibility {
        strategy: String,
        items: Vec<DropdownLink>,
    },
    Timeout {
        after_ms: u64,
    },
    Error {
        message: String,
    },
}

/// Dropdown result for one navigation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownResult {
    pub item_index: usize,
    pub item_text: String,
    #[serde(flatten)]
    pub outcome: DropdownOutcome,
    pub duration_ms: u64,
}

impl DropdownResult {
    pub fn method(&self) -> RevealMethod {
        match self.outcome {
            DropdownOutcome::Hover { .. } => RevealMethod::Hover,
            DropdownOutcome::ForceVisibility { .. } => RevealMethod::ForceVisibility,
            DropdownOutcome::Timeout { .. } => RevealMethod::Timeout,
            DropdownOutcome::Error { .. } => RevealMethod::Error,
        }
    }

    pub fn strategy_used(&self) -> Option<&str> {
        match &self.outcome {
            DropdownOutcome::ForceVisibility { strategy, .. } => Some(strategy),
            DropdownOutcome::Hover { .. } => Some("hover"),
            _ => None,
        }
    }

    pub fn items(&self) -> &[DropdownLink] {
        match &self.outcome {
            DropdownOutcome::Hover { items } | DropdownOutcome::ForceVisibility { items, .. } => {
                items
            }
            _ => &[],
        }
    }

    pub fn count(&self) -> usize {
        self.items().len()
    }

    pub fn success(&self) -> bool {
        self.count() > 0
    }

    pub fn error(&self) -> Option<String> {
        match &self.outcome {
            DropdownOutcome::Error { message } => Some(message.clone()),
            DropdownOutcome::Timeout { after_ms } => Some(
                EngineError::timeout("dropdown reveal", Duration::from_millis(*after_ms))
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Phase 1 output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainNavigation {
    pub items: Vec<NavigationItem>,
    pub count: usize,
    /// Containers matched by the pattern before any were skipped.
    pub container_matches: usize,
    pub skipped_hamburger: usize,
    pub skipped_missing_trigger: usize,
}

/// Per-method tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodTally {
    pub hover: usize,
    pub force_visibility: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_items: usize,
    pub successful_items: usize,
    pub success_rate: f64,
    pub total_links: usize,
    pub methods: MethodTally,
    pub duration_ms: u64,
}

/// Everything one pattern produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub pattern: String,
    pub success: bool,
    pub error: Option<String>,
    pub main_navigation: MainNavigation,
    pub dropdowns: Vec<DropdownResult>,
    pub stats: ExtractionStats,
    /// The run's deadline expired before every item was processed.
    pub cancelled: bool,
}

impl ExtractionResult {
    fn failed(pattern: &str, error: String, started: Instant) -> Self {
        Self {
            pattern: pattern.to_string(),
            success: false,
            error: Some(error),
            main_navigation: MainNavigation::default(),
            dropdowns: Vec::new(),
            stats: ExtractionStats {
                duration_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            },
            cancelled: false,
        }
    }
}

/// Extracts one pattern's navigation tree from a page.
#[derive(Debug, Clone, Default)]
pub struct NavigationExtractor {
    config: NavigationConfig,
}

impl NavigationExtractor {
    pub fn new(config: NavigationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Run all three phases for `pattern`. Never errors: a missing container
    /// comes back as `success: false`, per-item failures as tallied results.
    pub async fn extract(
        &self,
        ctx: &dyn RenderContext,
        pattern: &NavigationPattern,
        deadline: Deadline,
    ) -> ExtractionResult {
        let started = Instant::now();

        // Phase 1
        let main = match self.main_navigation(ctx, pattern).await {
            Ok(main) if main.count > 0 => main,
            Ok(_) => {
                return ExtractionResult::failed(
                    &pattern.name,
                    "no main navigation items".into(),
                    started,
                )
            }
            Err(e) => {
                debug!(pattern = %pattern.name, error = %e, "main navigation not found");
                return ExtractionResult::failed(
                    &pattern.name,
                    "no main navigation items".into(),
                    started,
                );
            }
        };
        info!(pattern = %pattern.name, items = main.count, "main navigation found");

        // Phase 2
        let mut dropdowns = Vec::with_capacity(main.items.len());
        let mut cancelled = false;
        for item in &main.items {
            if deadline.is_expired() {
                warn!(pattern = %pattern.name, "deadline expired, stopping dropdown extraction");
                cancelled = true;
                break;
            }
            self.reset_interaction_state(ctx).await;
            dropdowns.push(self.reveal_with_timeout(ctx, pattern, item, deadline).await);
        }
        self.reset_interaction_state(ctx).await;

        // Phase 3
        let stats = compile_stats(&main, &dropdowns, started);
        info!(
            pattern = %pattern.name,
            successful = stats.successful_items,
            total = stats.total_items,
            hover = stats.methods.hover,
            forced = stats.methods.force_visibility,
            failed = stats.methods.failed,
            "dropdown extraction complete"
        );

        ExtractionResult {
            pattern: pattern.name.clone(),
            success: true,
            error: None,
            main_navigation: main,
            dropdowns,
            stats,
            cancelled,
        }
    }

    /// Phase 1: top-level entries with per-entry selectors.
    pub async fn main_navigation(
        &self,
        ctx: &dyn RenderContext,
        pattern: &NavigationPattern,
    ) -> Result<MainNavigation> {
        let selectors = &pattern.selectors;
        let visible = ctx
            .wait_for_selector(
                &selectors.container,
                WaitState::Visible,
                self.config.container_timeout_ms,
            )
            .await?;
        if !visible {
            return Err(EngineError::selector_not_found(&selectors.container).into());
        }

        let containers = ctx
            .query(
                &DomQuery::new(&selectors.container)
                    .attrs(&["aria-label", "aria-controls", "data-testid"])
                    .limit(self.config.max_items),
            )
            .await?;

        let mut main = MainNavigation {
            container_matches: containers.len(),
            ..Default::default()
        };

        for container in &containers {
            if is_hamburger(container) {
                debug!(text = %container.text, "skipping hamburger toggle");
                main.skipped_hamburger += 1;
                continue;
            }

            let path = container.selector();
            let trigger_selector = scoped(&path, &selectors.trigger);
            let trigger = ctx
                .query(
                    &DomQuery::new(&trigger_selector)
                        .attrs(&["aria-label"])
                        .limit(1),
                )
                .await?;
            let Some(trigger) = trigger.into_iter().next() else {
                debug!(container = %path, "container has no trigger");
                main.skipped_missing_trigger += 1;
                continue;
            };
            if is_hamburger(&trigger) {
                main.skipped_hamburger += 1;
                continue;
            }

            let text = if trigger.text.is_empty() {
                trigger.attr("aria-label").unwrap_or_default().to_string()
            } else {
                trigger.text.clone()
            };
            let dropdown = if selectors.is_dynamic_dropdown() {
                DYNAMIC_DROPDOWN.to_string()
            } else {
                scoped(&path, &selectors.dropdown)
            };

            main.items.push(NavigationItem {
                text,
                href: trigger.href.clone(),
                index: main.items.len(),
                selectors: PatternSelectors {
                    container: path,
                    trigger: trigger_selector,
                    dropdown,
                },
                bounding_box: container.bounding_box,
                is_visible: container.is_visible(),
            });
        }

        main.count = main.items.len();
        Ok(main)
    }

    /// Phase 2 for one item, raced against the dropdown timeout.
    async fn reveal_with_timeout(
        &self,
        ctx: &dyn RenderContext,
        pattern: &NavigationPattern,
        item: &NavigationItem,
        deadline: Deadline,
    ) -> DropdownResult {
        let started = Instant::now();
        let budget = deadline.clamp(self.config.dropdown_timeout());

        // Both branches coming back empty is the same outcome as the race
        // firing: nothing was revealed within the timeout.
        let outcome = match tokio::time::timeout(budget, self.reveal(ctx, pattern, item)).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!(
                    pattern = %pattern.name,
                    item = %item.text,
                    "neither branch revealed content"
                );
                self.reset_interaction_state(ctx).await;
                DropdownOutcome::Timeout {
                    after_ms: budget.as_millis() as u64,
                }
            }
            Err(_) => {
                warn!(
                    pattern = %pattern.name,
                    item = %item.text,
                    timeout_ms = budget.as_millis() as u64,
                    "dropdown reveal timed out"
                );
                self.reset_interaction_state(ctx).await;
                DropdownOutcome::Timeout {
                    after_ms: budget.as_millis() as u64,
                }
            }
        };

        DropdownResult {
            item_index: item.index,
            item_text: item.text.clone(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Hover branch, then force-visibility branch if hovering found nothing.
    /// `None` when both ran cleanly and revealed nothing.
    async fn reveal(
        &self,
        ctx: &dyn RenderContext,
        pattern: &NavigationPattern,
        item: &NavigationItem,
    ) -> Option<DropdownOutcome> {
        let hover_error = match self.hover_branch(ctx, pattern, item).await {
            Ok(items) if !items.is_empty() => return Some(DropdownOutcome::Hover { items }),
            Ok(_) => {
                debug!(item = %item.text, "hover revealed nothing");
                None
            }
            Err(e) => {
                debug!(item = %item.text, error = %e, "hover branch failed");
                Some(e.to_string())
            }
        };

        match self.force_visibility_branch(ctx, item).await {
            Ok(Some((strategy, items))) => {
                Some(DropdownOutcome::ForceVisibility { strategy, items })
            }
            Ok(None) => hover_error.map(|message| DropdownOutcome::Error { message }),
            Err(e) => Some(DropdownOutcome::Error {
                message: e.to_string(),
            }),
        }
    }

    async fn hover_branch(
        &self,
        ctx: &dyn RenderContext,
        pattern: &NavigationPattern,
        item: &NavigationItem,
    ) -> Result<Vec<DropdownLink>> {
        let target = &item.selectors.trigger;
        match pattern.interaction_type {
            InteractionType::Hover => ctx.hover(target, self.config.action_timeout_ms).await?,
            InteractionType::Click => ctx.click(target, self.config.action_timeout_ms).await?,
        }

        let dynamic = item.selectors.dropdown == DYNAMIC_DROPDOWN;
        let settle = if dynamic {
            self.config.dynamic_settle_ms
        } else {
            self.config.hover_settle_ms
        };
        tokio::time::sleep(Duration::from_millis(settle)).await;

        let dropdown = self.dropdown_selector(ctx, item).await?;
        Ok(self.read_dropdown(ctx, &dropdown).await?.unwrap_or_default())
    }

    async fn force_visibility_branch(
        &self,
        ctx: &dyn RenderContext,
        item: &NavigationItem,
    ) -> Result<Option<(String, Vec<DropdownLink>)>> {
        let dropdown = self.dropdown_selector(ctx, item).await?;
        let mut found = None;

        for (strategy, display) in FORCE_STRATEGIES {
            let touched = ctx
                .set_style(
                    &dropdown,
                    &declarations(&[
                        ("display", display),
                        ("visibility", "visible"),
                        ("opacity", "1"),
                    ]),
                )
                .await?;
            if touched == 0 {
                return Err(EngineError::selector_not_found(&dropdown).into());
            }
            tokio::time::sleep(Duration::from_millis(self.config.force_settle_ms)).await;

            if let Some(items) = self.read_dropdown(ctx, &dropdown).await? {
                if !items.is_empty() {
                    found = Some((strategy.to_string(), items));
                    break;
                }
            }
        }

        // Leave the panel as the page styled it.
        let restore = declarations(&[("display", ""), ("visibility", ""), ("opacity", "")]);
        if let Err(e) = ctx.set_style(&dropdown, &restore).await {
            debug!(error = %e, "failed to restore dropdown style");
        }
        Ok(found)
    }

    /// The item's dropdown selector, resolving dynamic flyouts by item text.
    async fn dropdown_selector(
        &self,
        ctx: &dyn RenderContext,
        item: &NavigationItem,
    ) -> Result<String> {
        if item.selectors.dropdown != DYNAMIC_DROPDOWN {
            return Ok(item.selectors.dropdown.clone());
        }
        let panels = ctx
            .query(&DomQuery::new(FLYOUT_PANELS).attrs(&[
                "aria-label",
                "aria-labelledby",
                "data-flyout",
                "data-menu",
                "data-category",
            ]))
            .await?;
        resolve_dynamic_dropdown(&item.text, &panels).ok_or_else(|| {
            EngineError::selector_not_found(format!("flyout for {}", item.text)).into()
        })
    }

    /// Visible-check the first dropdown match and collect its links.
    /// `None` when the panel is absent or hidden.
    async fn read_dropdown(
        &self,
        ctx: &dyn RenderContext,
        dropdown: &str,
    ) -> Result<Option<Vec<DropdownLink>>> {
        let panel = ctx.query(&DomQuery::new(dropdown).limit(1)).await?;
        let Some(panel) = panel.into_iter().next() else {
            return Ok(None);
        };
        if !panel.is_visible() {
            return Ok(None);
        }

        let anchors = ctx
            .query(
                &DomQuery::new(format!("{} a[href]", panel.selector()))
                    .limit(self.config.max_dropdown_links),
            )
            .await?;
        Ok(Some(collect_links(&panel, &anchors)))
    }

    /// Clear hover state left by the previous item: park the pointer at a
    /// randomized neutral spot and nudge the scroll position.
    async fn reset_interaction_state(&self, ctx: &dyn RenderContext) {
        let (x, y) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(2.0..40.0), rng.gen_range(520.0..700.0))
        };
        if let Err(e) = ctx.mouse_move(x, y).await {
            debug!(error = %e, "pointer reset failed");
        }
        for script in ["window.scrollBy(0, 1)", "window.scrollBy(0, -1)"] {
            if let Err(e) = ctx.execute_js(script).await {
                debug!(error = %e, script, "scroll nudge failed");
            }
        }
    }
}

/// Hamburger / mobile-only toggles are not menu entries.
pub fn is_hamburger(el: &ElementSnapshot) -> bool {
    let re = hamburger_re();
    let attr_hit = ["class", "id", "aria-label", "aria-controls", "data-testid"]
        .iter()
        .filter_map(|name| el.attr(name))
        .any(|v| re.is_match(v));
    attr_hit || el.text.eq_ignore_ascii_case("menu")
}

/// Pick the flyout panel that belongs to a nav entry by matching the entry's
/// slug against panel ids, labels and data attributes. Exact slug matches
/// win over partial ones.
pub fn resolve_dynamic_dropdown(item_text: &str, panels: &[ElementSnapshot]) -> Option<String> {
    let wanted = slugify(item_text);
    if wanted.len() < 2 {
        return None;
    }

    let mut partial = None;
    for panel in panels {
        let keys = panel
            .attributes
            .iter()
            .filter(|(name, _)| name.as_str() != "class")
            .map(|(_, v)| slugify(v));
        for key in keys {
            if key == wanted
                || key.strip_suffix("-menu") == Some(wanted.as_str())
                || key.strip_suffix("-flyout") == Some(wanted.as_str())
            {
                return Some(panel.selector());
            }
            if partial.is_none() && wanted.len() >= 3 && key.split('-').any(|t| t == wanted) {
                partial = Some(panel.selector());
            }
        }
    }
    partial
}

fn collect_links(panel: &ElementSnapshot, anchors: &[ElementSnapshot]) -> Vec<DropdownLink> {
    let base_depth = panel.ancestry.len();
    let mut seen = HashSet::new();
    anchors
        .iter()
        .filter(|a| !a.text.is_empty())
        .filter_map(|a| {
            let href = a.href.as_deref()?;
            if href.starts_with("javascript:") || href.ends_with('#') {
                return None;
            }
            let lists = a
                .ancestry
                .iter()
                .skip(base_depth)
                .filter(|seg| seg.tag == "ul" || seg.tag == "ol")
                .count();
            Some(DropdownLink {
                text: a.text.clone(),
                href: href.to_string(),
                depth: lists.saturating_sub(1),
            })
        })
        .filter(|link| seen.insert((link.text.clone(), link.href.clone())))
        .collect()
}

fn compile_stats(
    main: &MainNavigation,
    dropdowns: &[DropdownResult],
    started: Instant,
) -> ExtractionStats {
    let mut methods = MethodTally::default();
    for d in dropdowns {
        match (d.method(), d.success()) {
            (RevealMethod::Hover, true) => methods.hover += 1,
            (RevealMethod::ForceVisibility, true) => methods.force_visibility += 1,
            _ => methods.failed += 1,
        }
    }
    let successful_items = methods.hover + methods.force_visibility;
    let total_items = main.count;
    ExtractionStats {
        total_items,
        successful_items,
        success_rate: if total_items == 0 {
            0.0
        } else {
            successful_items as f64 / total_items as f64
        },
        total_links: dropdowns.iter().map(DropdownResult::count).sum(),
        methods,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
