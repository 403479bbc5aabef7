// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Depth-first subcategory walk over one page session.
//!
//! The frontier is an explicit stack. Two run-scoped sets keyed by canonical
//! URL guard it: `visited` holds expanded pages, `claimed` every URL already
//! placed in the tree (seeds, queued children, visited pages). A link is a
//! subcategory only if nothing has claimed it yet and it is not a path
//! ancestor of the page, so shared sidebars and back-links never re-parent
//! a category. A page that fails to load or read abandons only its own branch.

use super::classifier::{is_sub_path, UrlClass, UrlClassifier};
use super::{CategoryEntry, CategoryHierarchy, CrawlFailure, SeedEntry};
use crate::budget::Deadline;
use crate::canonical::{key_or_raw, Canonicalizer, TrackingParamCanonicalizer};
use crate::config::CrawlConfig;
use crate::dom::DomQuery;
use crate::renderer::{RenderContext, WaitPolicy};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PRODUCT_CARD_SELECTOR: &str = r#"[data-product-id], [data-product], [itemtype*="schema.org/Product"], [class*="product-card"], [class*="product-tile"], [class*="productCard"], [class*="product-item"]"#;

/// Link container heuristics, tried in order until one yields links.
struct LinkSource {
    name: &'static str,
    selector: &'static str,
    /// Only accept links below the current page's path.
    sub_path_only: bool,
}

const LINK_SOURCES: &[LinkSource] = &[
    LinkSource {
        name: "sidebar",
        selector: r#"aside, [class*="sidebar"], [class*="side-nav"], [class*="category-nav"], [class*="refinement-category"]"#,
        sub_path_only: false,
    },
    LinkSource {
        name: "grid",
        selector: r#"[class*="category-grid"], [class*="category-tiles"], [class*="category-list"], [class*="subcategor"], [class*="categories"]"#,
        sub_path_only: false,
    },
    LinkSource {
        name: "breadcrumb",
        selector: r#"nav[aria-label*="readcrumb"], [class*="breadcrumb"], [itemtype*="BreadcrumbList"]"#,
        sub_path_only: true,
    },
    LinkSource {
        name: "generic",
        selector: r#"main, [role="main"], body"#,
        sub_path_only: true,
    },
];

const MAX_LINKS_PER_SOURCE: usize = 500;

/// A link accepted as a subcategory of the current page.
#[derive(Debug, Clone)]
struct SubcategoryLink {
    url: String,
    text: String,
    key: String,
}

struct PageScan {
    links: Vec<SubcategoryLink>,
    link_source: Option<&'static str>,
    product_signals: usize,
}

struct Frontier {
    url: String,
    name: String,
    navigation_path: Vec<String>,
    depth: u32,
    parent_url: Option<String>,
}

pub struct SubCategoryExplorer {
    config: CrawlConfig,
    classifier: UrlClassifier,
    canonicalizer: Arc<dyn Canonicalizer>,
}

impl SubCategoryExplorer {
    pub fn new(config: CrawlConfig) -> Self {
        let classifier = UrlClassifier::new(config.same_host_only);
        Self {
            config,
            classifier,
            canonicalizer: Arc::new(TrackingParamCanonicalizer),
        }
    }

    pub fn with_classifier(mut self, classifier: UrlClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Walk every seed depth-first and return the flat hierarchy.
    pub async fn explore_all(
        &self,
        ctx: &mut dyn RenderContext,
        seeds: &[SeedEntry],
        deadline: Deadline,
    ) -> CategoryHierarchy {
        let started = Instant::now();
        let mut hierarchy = CategoryHierarchy {
            started_at: Utc::now(),
            ..Default::default()
        };
        let mut visited: HashSet<String> = HashSet::new();
        let mut claimed: HashSet<String> = seeds
            .iter()
            .map(|s| key_or_raw(self.canonicalizer.as_ref(), &s.url).0)
            .collect();

        let mut stack: Vec<Frontier> = seeds
            .iter()
            .rev()
            .map(|s| Frontier {
                url: s.url.clone(),
                name: s.name.clone(),
                navigation_path: if s.navigation_path.is_empty() {
                    vec![s.name.clone()]
                } else {
                    s.navigation_path.clone()
                },
                depth: 0,
                parent_url: None,
            })
            .collect();
        info!(seeds = seeds.len(), max_depth = self.config.max_depth, "starting category crawl");

        while let Some(entry) = stack.pop() {
            if deadline.is_expired() {
                warn!(remaining = stack.len() + 1, "deadline expired, stopping crawl");
                hierarchy.cancelled = true;
                break;
            }
            let (key, _) = key_or_raw(self.canonicalizer.as_ref(), &entry.url);
            if visited.contains(&key) {
                hierarchy.stats.skipped_visited += 1;
                continue;
            }
            if entry.depth >= self.config.max_depth {
                hierarchy.stats.skipped_depth += 1;
                continue;
            }
            visited.insert(key);

            let scan = match self.visit(ctx, &entry.url, &claimed).await {
                Ok(scan) => scan,
                Err(e) => {
                    warn!(
                        url = %entry.url,
                        depth = entry.depth,
                        error = %e,
                        "category page failed, abandoning branch"
                    );
                    hierarchy.stats.failed += 1;
                    hierarchy.failures.push(CrawlFailure {
                        url: entry.url.clone(),
                        depth: entry.depth,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            // Redirect targets count as visited too.
            if let Ok(final_url) = ctx.get_url().await {
                let final_key = key_or_raw(self.canonicalizer.as_ref(), &final_url).0;
                claimed.insert(final_key.clone());
                visited.insert(final_key);
            }
            for link in &scan.links {
                claimed.insert(link.key.clone());
            }
            hierarchy.stats.visited += 1;

            let has_products = scan.product_signals >= self.config.min_product_signals;
            let is_leaf = has_products && scan.links.is_empty();
            if is_leaf {
                hierarchy.stats.leaf_count += 1;
            }
            debug!(
                url = %entry.url,
                depth = entry.depth,
                links = scan.links.len(),
                source = scan.link_source.unwrap_or("none"),
                products = scan.product_signals,
                "category page read"
            );

            let children: Vec<Frontier> = scan
                .links
                .iter()
                .take(self.config.max_categories_per_level)
                .map(|link| {
                    let mut path = entry.navigation_path.clone();
                    path.push(link.text.clone());
                    Frontier {
                        url: link.url.clone(),
                        name: link.text.clone(),
                        navigation_path: path,
                        depth: entry.depth + 1,
                        parent_url: Some(entry.url.clone()),
                    }
                })
                .collect();

            hierarchy.entries.push(CategoryEntry {
                url: entry.url,
                name: entry.name,
                navigation_path: entry.navigation_path,
                depth: entry.depth,
                parent_url: entry.parent_url,
                is_leaf,
                has_products,
                subcategory_count: scan.links.len(),
                product_signals: scan.product_signals,
                link_source: scan.link_source.map(String::from),
            });

            stack.extend(children.into_iter().rev());
        }

        hierarchy.stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            visited = hierarchy.stats.visited,
            leaves = hierarchy.stats.leaf_count,
            failed = hierarchy.stats.failed,
            "category crawl complete"
        );
        hierarchy
    }

    async fn visit(
        &self,
        ctx: &mut dyn RenderContext,
        url: &str,
        claimed: &HashSet<String>,
    ) -> Result<PageScan> {
        ctx.navigate(url, WaitPolicy::Load, self.config.navigation_timeout_ms)
            .await?;
        if self.config.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        }
        let current = ctx.get_url().await.unwrap_or_else(|_| url.to_string());
        self.scan_page(&*ctx, &current, claimed).await
    }

    /// Read the page's new subcategory links and product signals. Links
    /// already claimed elsewhere in the run, or above the page in the path
    /// hierarchy, are not subcategories of this page.
    async fn scan_page(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
        claimed: &HashSet<String>,
    ) -> Result<PageScan> {
        let page_key = key_or_raw(self.canonicalizer.as_ref(), page_url).0;

        let mut links = Vec::new();
        let mut link_source = None;
        for source in LINK_SOURCES {
            let anchors = ctx
                .query(
                    &DomQuery::new("a[href]")
                        .within(source.selector)
                        .limit(MAX_LINKS_PER_SOURCE),
                )
                .await?;

            let mut seen = HashSet::new();
            for a in anchors {
                let Some(href) = a.href.as_deref() else {
                    continue;
                };
                if a.text.is_empty()
                    || self.classifier.classify(href, page_url) != UrlClass::Category
                    || (source.sub_path_only && !is_sub_path(href, page_url))
                    || is_sub_path(page_url, href)
                {
                    continue;
                }
                let key = key_or_raw(self.canonicalizer.as_ref(), href).0;
                if key == page_key || claimed.contains(&key) || !seen.insert(key.clone()) {
                    continue;
                }
                links.push(SubcategoryLink {
                    url: href.to_string(),
                    text: a.text.clone(),
                    key,
                });
            }
            if !links.is_empty() {
                link_source = Some(source.name);
                break;
            }
        }

        let cards = ctx.query(&DomQuery::new(PRODUCT_CARD_SELECTOR)).await?.len();
        let product_links = ctx
            .query(&DomQuery::new("a[href]").limit(MAX_LINKS_PER_SOURCE))
            .await?
            .iter()
            .filter_map(|a| a.href.as_deref())
            .filter(|h| self.classifier.is_product(h, page_url))
            .collect::<HashSet<_>>()
            .len();

        Ok(PageScan {
            links,
            link_source,
            product_signals: cards.max(product_links),
        })
    }
}
