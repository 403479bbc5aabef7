// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle explore <url>`: apply every discovered filter and collect products.

use super::filters_cmd::load_vocabulary;
use super::output::{self, Styled};
use super::session::Session;
use super::RunOptions;
use crate::filters::{FilterDiscoveryEngine, FilterExplorationEngine, FilterState};
use anyhow::Result;
use std::path::Path;

/// Run the explore command.
pub async fn run(
    opts: &RunOptions,
    url: &str,
    name: Option<&str>,
    vocabulary: Option<&Path>,
) -> Result<()> {
    let engine = FilterExplorationEngine::new(
        opts.config.exploration.clone(),
        FilterDiscoveryEngine::new(opts.config.filters.clone(), load_vocabulary(vocabulary)?),
    );
    let name = name.unwrap_or(url);
    let mut session = Session::open(opts.offline.as_deref(), url).await?;
    let result = engine
        .explore_category(session.page(), url, name, opts.deadline)
        .await;
    session.close().await?;
    let result = result?;

    if output::is_json() {
        output::print_json(&result);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    for p in &result.filter_paths {
        let ok = p.state == FilterState::Captured;
        println!(
            "  {} {:<28} {:>4} products  {:>4} new{}",
            s.sym(ok),
            p.filter,
            p.products_found,
            p.new_products,
            p.error.as_deref().map(|e| format!("  ({e})")).unwrap_or_default()
        );
    }
    let st = &result.stats;
    println!();
    println!(
        "  {} products ({} baseline), {} sightings, {} merged by canonical URL",
        st.products, st.baseline_products, st.sightings, st.canonical_collisions
    );
    if result.cancelled {
        eprintln!("  {} deadline expired, results are partial", s.warn_sym());
    }
    Ok(())
}
