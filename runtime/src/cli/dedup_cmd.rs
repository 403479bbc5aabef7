// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle dedup <file>`: decide crawl modes for a list of categories.
//!
//! The input is a JSON array of `{ "name", "url"?, "products": [...] }`.
//! Product entries may be raw URLs; they are canonicalised before comparison.

use super::output::{self, Styled};
use crate::canonical::TrackingParamCanonicalizer;
use crate::config::DedupConfig;
use crate::taxonomy::{CategoryDeduplicator, CategorySample, CrawlMode, TaxonomyVocabulary};
use anyhow::{Context, Result};
use std::path::Path;

pub fn load_samples(path: &Path) -> Result<Vec<CategorySample>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let samples: Vec<CategorySample> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a category list", path.display()))?;
    let canonicalizer = TrackingParamCanonicalizer;
    Ok(samples
        .into_iter()
        .map(|s| {
            CategorySample::from_products(
                s.name,
                s.url,
                s.products.iter().map(String::as_str),
                &canonicalizer,
            )
        })
        .collect())
}

/// Run the dedup command.
pub async fn run(config: &DedupConfig, input: &Path, taxonomy: Option<&Path>) -> Result<()> {
    let vocabulary = match taxonomy {
        Some(p) => TaxonomyVocabulary::from_path(p)?,
        None => TaxonomyVocabulary::builtin(),
    };
    let samples = load_samples(input)?;
    let results = CategoryDeduplicator::new(config.clone(), vocabulary).deduplicate(&samples);

    if output::is_json() {
        output::print_json(&results);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }
    let s = Styled::new();
    for r in &results {
        let marker = match r.crawl_mode {
            CrawlMode::Products => s.ok_sym(),
            CrawlMode::StructuralOnly | CrawlMode::Alias => s.warn_sym(),
        };
        println!(
            "  {} {:<32} {:<16} {}{}",
            marker,
            r.name,
            r.crawl_mode.as_str(),
            r.reason,
            r.alias_of.as_deref().map(|a| format!(" → {a}")).unwrap_or_default()
        );
    }
    Ok(())
}
