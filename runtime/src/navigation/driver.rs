// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pattern fallback chain.
//!
//! Tries the catalog's candidate patterns for a site in priority order and
//! accepts the first result with enough top-level items and a high enough
//! dropdown success rate. When nothing qualifies the best partial result is
//! still returned, flagged `success: false`.

use super::catalog::PatternCatalog;
use super::extractor::{ExtractionResult, NavigationExtractor};
use crate::budget::Deadline;
use crate::config::DriverOptions;
use crate::crawl::SeedEntry;
use crate::error::EngineError;
use crate::renderer::{RenderContext, WaitPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summary of one pattern attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAttempt {
    pub pattern: String,
    pub item_count: usize,
    pub successful_items: usize,
    pub success_rate: f64,
    pub total_links: usize,
    pub qualified: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Result of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    pub site: String,
    pub success: bool,
    pub pattern_used: Option<String>,
    pub attempts: Vec<PatternAttempt>,
    /// Attempts made after the first one.
    pub fallbacks_used: usize,
    /// The accepted result, or the best partial one.
    pub result: Option<ExtractionResult>,
    pub error: Option<String>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl NavigationOutcome {
    /// Crawl seeds from the extracted tree: one per dropdown link, or one per
    /// top-level entry that has a link but no dropdown.
    pub fn seed_entries(&self) -> Vec<SeedEntry> {
        let Some(result) = &self.result else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();

        for item in &result.main_navigation.items {
            let links = result
                .dropdowns
                .iter()
                .find(|d| d.item_index == item.index)
                .map(|d| d.items())
                .unwrap_or_default();

            if links.is_empty() {
                if let Some(href) = &item.href {
                    if seen.insert(href.clone()) {
                        seeds.push(SeedEntry::new(href, &item.text, vec![item.text.clone()]));
                    }
                }
                continue;
            }
            for link in links {
                if seen.insert(link.href.clone()) {
                    seeds.push(SeedEntry::new(
                        &link.href,
                        &link.text,
                        vec![item.text.clone(), link.text.clone()],
                    ));
                }
            }
        }
        seeds
    }
}

/// Runs [`NavigationExtractor`] over a site's candidate patterns.
#[derive(Debug, Clone)]
pub struct RedundantExtractionDriver {
    catalog: PatternCatalog,
    extractor: NavigationExtractor,
    options: DriverOptions,
}

impl RedundantExtractionDriver {
    pub fn new(
        catalog: PatternCatalog,
        extractor: NavigationExtractor,
        options: DriverOptions,
    ) -> Self {
        Self {
            catalog,
            extractor,
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Try candidate patterns until one qualifies. The page is expected to
    /// be on the site's landing page already; an attempt that navigates
    /// away (click-driven menus) is undone before the next one.
    pub async fn extract_with_fallback(
        &self,
        ctx: &mut dyn RenderContext,
        site: &str,
        deadline: Deadline,
    ) -> NavigationOutcome {
        let started = Instant::now();
        let started_at = Utc::now();
        let candidates = self.catalog.patterns_for_site(site);
        let start_url = ctx.get_url().await.ok();
        info!(site, candidates = candidates.len(), "starting navigation extraction");

        let mut attempts = Vec::new();
        let mut best: Option<ExtractionResult> = None;
        let mut accepted: Option<ExtractionResult> = None;
        let mut cancelled = false;

        for pattern in candidates.into_iter().take(self.options.max_patterns) {
            if deadline.is_expired() {
                warn!(site, "deadline expired before all patterns were tried");
                cancelled = true;
                break;
            }
            if !attempts.is_empty() {
                self.restore_page(ctx, start_url.as_deref()).await;
            }

            let result = self.extractor.extract(&*ctx, pattern, deadline).await;
            let qualified = self.qualifies(&result);
            debug!(
                pattern = %pattern.name,
                items = result.main_navigation.count,
                rate = result.stats.success_rate,
                qualified,
                "pattern attempt finished"
            );
            attempts.push(PatternAttempt {
                pattern: pattern.name.clone(),
                item_count: result.main_navigation.count,
                successful_items: result.stats.successful_items,
                success_rate: result.stats.success_rate,
                total_links: result.stats.total_links,
                qualified,
                error: result.error.clone(),
                duration_ms: result.stats.duration_ms,
            });
            cancelled |= result.cancelled;

            if qualified {
                accepted = Some(result);
                break;
            }
            if best.as_ref().map_or(true, |b| rank(&result) > rank(b)) {
                best = Some(result);
            }
        }

        let fallbacks_used = attempts.len().saturating_sub(1);
        let duration_ms = started.elapsed().as_millis() as u64;

        match accepted {
            Some(result) => {
                info!(site, pattern = %result.pattern, fallbacks_used, "navigation extracted");
                NavigationOutcome {
                    site: site.to_string(),
                    success: true,
                    pattern_used: Some(result.pattern.clone()),
                    attempts,
                    fallbacks_used,
                    result: Some(result),
                    error: None,
                    cancelled,
                    started_at,
                    duration_ms,
                }
            }
            None => {
                let error = if cancelled {
                    EngineError::Cancelled
                } else {
                    EngineError::PatternExhausted {
                        attempts: attempts.len(),
                    }
                };
                warn!(site, attempts = attempts.len(), "{error}");
                NavigationOutcome {
                    site: site.to_string(),
                    success: false,
                    pattern_used: best.as_ref().map(|b| b.pattern.clone()),
                    attempts,
                    fallbacks_used,
                    result: best,
                    error: Some(error.to_string()),
                    cancelled,
                    started_at,
                    duration_ms,
                }
            }
        }
    }

    fn qualifies(&self, result: &ExtractionResult) -> bool {
        result.success
            && result.main_navigation.count >= self.options.min_items
            && result.stats.success_rate >= self.options.min_success_rate
    }

    async fn restore_page(&self, ctx: &mut dyn RenderContext, start_url: Option<&str>) {
        let Some(start_url) = start_url else {
            return;
        };
        match ctx.get_url().await {
            Ok(current) if current == start_url => {}
            _ => {
                debug!(url = start_url, "returning to start page before next pattern");
                let timeout_ms = self.extractor.config().container_timeout_ms * 6;
                if let Err(e) = ctx.navigate(start_url, WaitPolicy::Load, timeout_ms).await {
                    warn!(url = start_url, error = %e, "failed to restore start page");
                }
            }
        }
    }
}

/// Ordering key for partial results: revealed dropdowns first, then rate,
/// then links collected, then raw item count.
fn rank(result: &ExtractionResult) -> (usize, u64, usize, usize) {
    (
        result.stats.successful_items,
        (result.stats.success_rate * 1_000.0) as u64,
        result.stats.total_links,
        result.main_navigation.count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::catalog::{InteractionType, NavigationPattern, PatternSelectors};
    use crate::navigation::extractor::{
        DropdownLink, DropdownOutcome, DropdownResult, ExtractionStats, MainNavigation,
        NavigationItem,
    };
    use std::collections::BTreeMap;

    fn item(index: usize, text: &str, href: Option<&str>) -> NavigationItem {
        NavigationItem {
            text: text.into(),
            href: href.map(String::from),
            index,
            selectors: PatternSelectors {
                container: format!("li:nth-of-type({})", index + 1),
                trigger: "a".into(),
                dropdown: ".dd".into(),
            },
            bounding_box: None,
            is_visible: true,
        }
    }

    fn result(pattern: &str, successful: usize, total: usize) -> ExtractionResult {
        ExtractionResult {
            pattern: pattern.into(),
            success: true,
            error: None,
            main_navigation: MainNavigation {
                count: total,
                ..Default::default()
            },
            dropdowns: Vec::new(),
            stats: ExtractionStats {
                total_items: total,
                successful_items: successful,
                success_rate: successful as f64 / total.max(1) as f64,
                ..Default::default()
            },
            cancelled: false,
        }
    }

    #[test]
    fn test_rank_prefers_revealed_dropdowns() {
        assert!(rank(&result("a", 3, 10)) > rank(&result("b", 2, 2)));
        assert!(rank(&result("a", 2, 2)) > rank(&result("b", 2, 4)));
    }

    #[test]
    fn test_qualifies_uses_thresholds() {
        let driver = RedundantExtractionDriver::new(
            PatternCatalog::new(
                vec![NavigationPattern {
                    name: "p".into(),
                    selectors: PatternSelectors {
                        container: "li".into(),
                        trigger: "a".into(),
                        dropdown: ".dd".into(),
                    },
                    interaction_type: InteractionType::Hover,
                    applicable_sites: vec![],
                }],
                BTreeMap::new(),
                vec![],
            ),
            NavigationExtractor::default(),
            DriverOptions::default(),
        );
        assert!(driver.qualifies(&result("p", 2, 3)));
        assert!(!driver.qualifies(&result("p", 1, 3)));
        assert!(!driver.qualifies(&result("p", 2, 2)));
    }

    #[test]
    fn test_seed_entries_from_dropdowns_and_bare_items() {
        let mut extraction = result("p", 1, 2);
        extraction.main_navigation.items = vec![
            item(0, "Women", Some("https://shop.test/women")),
            item(1, "Sale", Some("https://shop.test/sale")),
        ];
        extraction.dropdowns = vec![
            DropdownResult {
                item_index: 0,
                item_text: "Women".into(),
                outcome: DropdownOutcome::Hover {
                    items: vec![
                        DropdownLink {
                            text: "Dresses".into(),
                            href: "https://shop.test/women/dresses".into(),
                            depth: 0,
                        },
                        DropdownLink {
                            text: "Dresses".into(),
                            href: "https://shop.test/women/dresses".into(),
                            depth: 1,
                        },
                    ],
                },
                duration_ms: 1,
            },
            DropdownResult {
                item_index: 1,
                item_text: "Sale".into(),
                outcome: DropdownOutcome::Timeout { after_ms: 10 },
                duration_ms: 10,
            },
        ];
        let outcome = NavigationOutcome {
            site: "shop.test".into(),
            success: true,
            pattern_used: Some("p".into()),
            attempts: vec![],
            fallbacks_used: 0,
            result: Some(extraction),
            error: None,
            cancelled: false,
            started_at: Utc::now(),
            duration_ms: 0,
        };

        let seeds = outcome.seed_entries();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].navigation_path, vec!["Women", "Dresses"]);
        assert_eq!(seeds[1].url, "https://shop.test/sale");
        assert_eq!(seeds[1].navigation_path, vec!["Sale"]);
    }
}
