// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle crawl <url>...`: depth-first subcategory crawl from seed pages.

use super::nav_cmd;
use super::output::{self, Styled};
use super::session::Session;
use super::RunOptions;
use crate::crawl::{CategoryHierarchy, SeedEntry, SubCategoryExplorer};
use anyhow::{bail, Result};
use tracing::info;

/// Run the crawl command. With `from_nav`, the first URL is treated as a
/// site landing page and seeds come from its extracted navigation.
pub async fn run(
    opts: &RunOptions,
    urls: &[String],
    max_depth: Option<u32>,
    from_nav: bool,
) -> Result<()> {
    let Some(first) = urls.first() else {
        bail!("at least one seed URL is required");
    };
    let mut config = opts.config.crawl.clone();
    if let Some(depth) = max_depth {
        config.max_depth = depth;
    }
    let explorer = SubCategoryExplorer::new(config);
    let mut session = Session::open(opts.offline.as_deref(), first).await?;

    let seeds: Vec<SeedEntry> = if from_nav {
        session.goto(first, opts.config.crawl.navigation_timeout_ms).await?;
        let catalog = nav_cmd::load_catalog(None)?;
        let outcome = nav_cmd::extract(opts, &mut session, first, catalog).await;
        let seeds = outcome.seed_entries();
        info!(seeds = seeds.len(), pattern = ?outcome.pattern_used, "seeds from navigation");
        seeds
    } else {
        urls.iter().map(|u| SeedEntry::root(u, u)).collect()
    };

    let hierarchy = explorer
        .explore_all(session.page(), &seeds, opts.deadline)
        .await;
    session.close().await?;

    if output::is_json() {
        output::print_json(&hierarchy);
    } else if !output::is_quiet() {
        print_tree(&hierarchy);
    }
    Ok(())
}

fn print_tree(h: &CategoryHierarchy) {
    let s = Styled::new();
    for e in &h.entries {
        println!(
            "  {}{} {}  {}{}",
            "  ".repeat(e.depth as usize),
            if e.is_leaf { "·" } else { "+" },
            e.name,
            e.url,
            if e.has_products {
                format!("  [{} products]", e.product_signals)
            } else {
                String::new()
            }
        );
    }
    for f in &h.failures {
        eprintln!("  {} {}  ({})", s.fail_sym(), f.url, f.error);
    }
    let st = &h.stats;
    println!();
    println!(
        "  {} visited, {} leaves, {} already seen, {} beyond depth, {} failed",
        st.visited, st.leaf_count, st.skipped_visited, st.skipped_depth, st.failed
    );
    if h.cancelled {
        eprintln!("  {} deadline expired, results are partial", s.warn_sym());
    }
}
