// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle nav <url>`: extract the main navigation tree with pattern fallback.

use super::output::{self, Styled};
use super::session::Session;
use super::RunOptions;
use crate::navigation::{
    NavigationExtractor, NavigationOutcome, PatternCatalog, RedundantExtractionDriver,
};
use anyhow::{bail, Result};
use std::path::Path;

pub fn load_catalog(path: Option<&Path>) -> Result<PatternCatalog> {
    match path {
        Some(p) => PatternCatalog::from_path(p),
        None => Ok(PatternCatalog::builtin()),
    }
}

/// Run the driver against an already-open session.
pub async fn extract(
    opts: &RunOptions,
    session: &mut Session,
    site: &str,
    catalog: PatternCatalog,
) -> NavigationOutcome {
    let driver = RedundantExtractionDriver::new(
        catalog,
        NavigationExtractor::new(opts.config.navigation.clone()),
        opts.config.driver.clone(),
    );
    driver
        .extract_with_fallback(session.page(), site, opts.deadline)
        .await
}

/// Run the nav command.
pub async fn run(
    opts: &RunOptions,
    url: &str,
    site: Option<&str>,
    catalog: Option<&Path>,
) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let mut session = Session::open(opts.offline.as_deref(), url).await?;
    session.goto(url, opts.config.crawl.navigation_timeout_ms).await?;
    let outcome = extract(opts, &mut session, site.unwrap_or(url), catalog).await;
    session.close().await?;

    if output::is_json() {
        output::print_json(&outcome);
    } else if !output::is_quiet() {
        print_outcome(&outcome);
    }
    if !outcome.success && outcome.result.is_none() {
        bail!(
            "{}",
            outcome.error.as_deref().unwrap_or("navigation extraction failed")
        );
    }
    Ok(())
}

fn print_outcome(outcome: &NavigationOutcome) {
    let s = Styled::new();
    for a in &outcome.attempts {
        eprintln!(
            "  {} {:<28} {:>3} items  {:>5.1}%  {:>4} links{}",
            s.sym(a.qualified),
            a.pattern,
            a.item_count,
            a.success_rate * 100.0,
            a.total_links,
            a.error.as_deref().map(|e| format!("  ({e})")).unwrap_or_default()
        );
    }
    let Some(result) = &outcome.result else {
        return;
    };
    println!();
    println!(
        "  Pattern: {}  ({} fallbacks, {}ms)",
        result.pattern, outcome.fallbacks_used, outcome.duration_ms
    );
    for dd in &result.dropdowns {
        println!(
            "  {} {:<24} {:<16} {:>3} links",
            s.sym(dd.success()),
            dd.item_text,
            dd.method().as_str(),
            dd.count()
        );
        for link in dd.items() {
            println!("      {}{}  {}", "  ".repeat(link.depth), link.text, link.href);
        }
    }
    if outcome.cancelled {
        eprintln!("  {} deadline expired, results are partial", s.warn_sym());
    }
}
