// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! `aisle filters <url>`: discover and rank filter controls on a listing page.

use super::output::{self, Styled};
use super::session::Session;
use super::RunOptions;
use crate::filters::{FilterDiscoveryEngine, FilterVocabulary};
use anyhow::Result;
use std::path::Path;

pub fn load_vocabulary(path: Option<&Path>) -> Result<FilterVocabulary> {
    match path {
        Some(p) => FilterVocabulary::from_path(p),
        None => Ok(FilterVocabulary::builtin()),
    }
}

/// Run the filters command.
pub async fn run(opts: &RunOptions, url: &str, vocabulary: Option<&Path>) -> Result<()> {
    let vocabulary = load_vocabulary(vocabulary)?;
    let engine = FilterDiscoveryEngine::new(opts.config.filters.clone(), vocabulary);
    let mut session = Session::open(opts.offline.as_deref(), url).await?;
    session.goto(url, opts.config.exploration.navigation_timeout_ms).await?;
    let result = engine.discover(session.page(), url).await;
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
    let st = &result.stats;
    eprintln!(
        "  {} containers, {} raw candidates, {} below threshold, {} hidden, {} excluded{}",
        st.containers_found,
        st.raw_candidates,
        st.below_threshold,
        st.hidden,
        st.excluded,
        if st.exclusion_fallback { " (exclusions skipped)" } else { "" }
    );
    for c in &result.candidates {
        println!(
            "  {} {:>2}  {:<9} {:<32} {}",
            if c.active { s.ok_sym() } else { " " },
            c.score,
            format!("{:?}", c.element_type).to_lowercase(),
            c.label,
            c.selector
        );
    }
    Ok(())
}
