// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle patterns`: list catalog patterns, in try order for a site.

use super::nav_cmd::load_catalog;
use super::output;
use anyhow::Result;
use std::path::Path;

/// Run the patterns command.
pub async fn run(site: Option<&str>, catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    let patterns: Vec<_> = match site {
        Some(site) => catalog.patterns_for_site(site),
        None => catalog.patterns().iter().collect(),
    };

    if output::is_json() {
        output::print_json(&patterns);
        return Ok(());
    }

    if let Some(site) = site {
        println!("  Patterns for {site} (try order):");
    }
    for (i, p) in patterns.iter().enumerate() {
        println!("  {:>2}. {}  ({:?})", i + 1, p.name, p.interaction_type);
        println!("      container: {}", p.selectors.container);
        println!("      trigger:   {}", p.selectors.trigger);
        println!("      dropdown:  {}", p.selectors.dropdown);
    }
    Ok(())
}
