// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Category deduplication.
//!
//! Decides, for a flat list of categories with sampled product sets, which
//! ones are worth crawling for products:
//!
//! - `alias`: near-identical products to a more specific category;
//! - `structural-only`: an umbrella whose sample covers two or more other
//!   categories almost entirely;
//! - `products`: everything else.
//!
//! Overlap is estimated on bounded samples. Every comparison between two
//! categories looks at the same window of the hash space, the `sample_size`
//! smallest hashes of the pair's union (or of the child, for coverage), so
//! both sides are always measured on aligned keys.
//!
//! Results are derived values. Input categories are never modified.

use super::qualifiers::{Qualifiers, TaxonomyVocabulary};
use super::slug::slugify;
use crate::canonical::{key_or_raw, Canonicalizer};
use crate::config::DedupConfig;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::hash::Hasher;
use tracing::{debug, info};

/// Deduplicator input: a category and the product keys seen in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySample {
    pub name: String,
    pub url: Option<String>,
    /// Canonical product keys. Order and duplicates do not matter.
    pub products: Vec<String>,
}

impl CategorySample {
    pub fn new(name: impl Into<String>, products: Vec<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            products,
        }
    }

    /// Build a sample from raw product URLs, keyed through `canonicalizer`.
    pub fn from_products<'a>(
        name: impl Into<String>,
        url: Option<String>,
        product_urls: impl IntoIterator<Item = &'a str>,
        canonicalizer: &dyn Canonicalizer,
    ) -> Self {
        let products = product_urls
            .into_iter()
            .map(|u| key_or_raw(canonicalizer, u).0)
            .collect();
        Self {
            name: name.into(),
            url,
            products,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlMode {
    Products,
    StructuralOnly,
    Alias,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::StructuralOnly => "structural-only",
            Self::Alias => "alias",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDeduplicationResult {
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub qualifiers: Qualifiers,
    pub crawl_mode: CrawlMode,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    /// Highest sampled overlap (Jaccard) with any other category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_overlap: Option<f64>,
    /// Categories this one covers, for `structural-only`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

/// Sorted, distinct, well-mixed hashes of a category's product keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySketch {
    hashes: Vec<u64>,
}

impl KeySketch {
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hashes: Vec<u64> = keys
            .into_iter()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(stable_hash)
            .collect();
        hashes.sort_unstable();
        hashes.dedup();
        Self { hashes }
    }

    /// Distinct keys seen.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    fn contains(&self, hash: u64) -> bool {
        self.hashes.binary_search(&hash).is_ok()
    }

    /// Estimated |A ∩ B| / |A ∪ B| over the `k` smallest hashes of the union,
    /// or `None` when either side is empty. Exact when the union fits in `k`.
    pub fn jaccard(&self, other: &KeySketch, k: usize) -> Option<f64> {
        if self.is_empty() || other.is_empty() || k == 0 {
            return None;
        }
        let (a, b) = (&self.hashes, &other.hashes);
        let (mut i, mut j) = (0, 0);
        let (mut seen, mut shared) = (0usize, 0usize);
        while seen < k && (i < a.len() || j < b.len()) {
            match (a.get(i), b.get(j)) {
                (Some(x), Some(y)) if x == y => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
                (Some(x), Some(y)) if x < y => i += 1,
                (Some(_), None) => i += 1,
                _ => j += 1,
            }
            seen += 1;
        }
        Some(shared as f64 / seen as f64)
    }

    /// Estimated share of `child` contained in `self`, over the `k` smallest
    /// hashes of the child.
    pub fn coverage_of(&self, child: &KeySketch, k: usize) -> f64 {
        let window = &child.hashes[..child.hashes.len().min(k)];
        if window.is_empty() {
            return 0.0;
        }
        let inside = window.iter().filter(|&&h| self.contains(h)).count();
        inside as f64 / window.len() as f64
    }
}

/// Per-category working state.
struct Prepared {
    index: usize,
    slug: String,
    qualifiers: Qualifiers,
    sketch: KeySketch,
}

impl Prepared {
    /// Total order on how specific a category is: more qualifiers, then a
    /// smaller product set, then a longer slug, then earlier input position.
    fn specificity(&self) -> (usize, Reverse<usize>, usize, Reverse<usize>) {
        (
            self.qualifiers.len(),
            Reverse(self.sketch.len()),
            self.slug.len(),
            Reverse(self.index),
        )
    }
}

pub struct CategoryDeduplicator {
    config: DedupConfig,
    vocabulary: TaxonomyVocabulary,
}

impl CategoryDeduplicator {
    pub fn new(config: DedupConfig, vocabulary: TaxonomyVocabulary) -> Self {
        Self { config, vocabulary }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Classify every category. Output order matches input order.
    pub fn deduplicate(&self, categories: &[CategorySample]) -> Vec<CategoryDeduplicationResult> {
        let prepared: Vec<Prepared> = categories
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let slug = slugify(&c.name);
                Prepared {
                    index,
                    qualifiers: self.vocabulary.qualifiers(&slug),
                    sketch: KeySketch::from_keys(c.products.iter().map(String::as_str)),
                    slug,
                }
            })
            .collect();

        let n = prepared.len();
        let k = self.config.sample_size;
        let mut overlap = vec![vec![None; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let o = prepared[i].sketch.jaccard(&prepared[j].sketch, k);
                overlap[i][j] = o;
                overlap[j][i] = o;
            }
        }
        let max_overlap: Vec<Option<f64>> = overlap
            .iter()
            .map(|row| row.iter().flatten().copied().reduce(f64::max))
            .collect();

        // Exact duplicates (same slug and qualifiers) collapse onto their
        // first occurrence regardless of product data.
        let mut alias_of: Vec<Option<(usize, String)>> = vec![None; n];
        let mut first_by_key: HashMap<(&str, &Qualifiers), usize> = HashMap::new();
        for p in &prepared {
            if p.slug.is_empty() {
                continue;
            }
            match first_by_key.get(&(p.slug.as_str(), &p.qualifiers)) {
                Some(&first) => alias_of[p.index] = Some((first, "duplicate slug".to_string())),
                None => {
                    first_by_key.insert((p.slug.as_str(), &p.qualifiers), p.index);
                }
            }
        }

        // Near-identical product sets: the less specific side becomes the alias.
        for i in 0..n {
            if alias_of[i].is_some() {
                continue;
            }
            let target = (0..n)
                .filter(|&j| {
                    j != i && alias_of[j].as_ref().map_or(true, |(_, r)| r != "duplicate slug")
                })
                .filter_map(|j| overlap[i][j].map(|o| (j, o)))
                .filter(|&(j, o)| {
                    o >= self.config.alias_threshold
                        && prepared[j].specificity() > prepared[i].specificity()
                })
                .max_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| prepared[a.0].specificity().cmp(&prepared[b.0].specificity()))
                });
            if let Some((j, o)) = target {
                alias_of[i] = Some((j, format!("{:.0}% product overlap", o * 100.0)));
            }
        }

        // Point aliases at a category that is itself canonical.
        let resolved: Vec<Option<(usize, String)>> = (0..n)
            .map(|i| {
                let (mut target, reason) = alias_of[i].clone()?;
                let mut hops = 0;
                while let Some((next, _)) = &alias_of[target] {
                    if *next == i || hops > n {
                        break;
                    }
                    target = *next;
                    hops += 1;
                }
                Some((target, reason))
            })
            .collect();

        let results: Vec<CategoryDeduplicationResult> = prepared
            .iter()
            .map(|p| {
                let source = &categories[p.index];
                let base = CategoryDeduplicationResult {
                    name: source.name.clone(),
                    slug: p.slug.clone(),
                    url: source.url.clone(),
                    qualifiers: p.qualifiers.clone(),
                    crawl_mode: CrawlMode::Products,
                    reason: String::new(),
                    alias_of: None,
                    max_overlap: max_overlap[p.index],
                    children: Vec::new(),
                };

                if let Some((target, reason)) = &resolved[p.index] {
                    return CategoryDeduplicationResult {
                        crawl_mode: CrawlMode::Alias,
                        reason: reason.clone(),
                        alias_of: Some(categories[*target].name.clone()),
                        ..base
                    };
                }

                let children = self.covered_children(p, &prepared, &resolved);
                if children.len() >= self.config.min_covered_children {
                    return CategoryDeduplicationResult {
                        crawl_mode: CrawlMode::StructuralOnly,
                        reason: format!("covers {} sibling categories", children.len()),
                        children: children
                            .iter()
                            .map(|&c| categories[c].name.clone())
                            .collect(),
                        ..base
                    };
                }

                let reason = if p.sketch.is_empty() {
                    "no product sample"
                } else {
                    "distinct product set"
                };
                CategoryDeduplicationResult {
                    reason: reason.to_string(),
                    ..base
                }
            })
            .collect();

        let aliases = results.iter().filter(|r| r.crawl_mode == CrawlMode::Alias).count();
        let structural = results
            .iter()
            .filter(|r| r.crawl_mode == CrawlMode::StructuralOnly)
            .count();
        info!(
            categories = n,
            aliases,
            structural,
            crawl = n - aliases - structural,
            "category deduplication complete"
        );
        results
    }

    /// Non-alias categories `parent` covers at or above the superset
    /// threshold. Only strictly smaller categories count.
    fn covered_children(
        &self,
        parent: &Prepared,
        prepared: &[Prepared],
        resolved: &[Option<(usize, String)>],
    ) -> Vec<usize> {
        if parent.sketch.is_empty() {
            return Vec::new();
        }
        let k = self.config.sample_size;
        prepared
            .iter()
            .filter(|c| c.index != parent.index && resolved[c.index].is_none())
            .filter(|c| !c.sketch.is_empty() && c.sketch.len() < parent.sketch.len())
            .filter(|c| {
                let cov = parent.sketch.coverage_of(&c.sketch, k);
                debug!(parent = %parent.slug, child = %c.slug, coverage = cov, "superset check");
                cov >= self.config.superset_threshold
            })
            .map(|c| c.index)
            .collect()
    }
}

impl Default for CategoryDeduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default(), TaxonomyVocabulary::builtin())
    }
}

/// FNV-1a followed by the murmur3 finalizer. FNV alone leaves keys that
/// differ only in their last bytes clustered in the high bits.
fn stable_hash(key: &str) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key.as_bytes());
    let mut h = hasher.finish();
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}
