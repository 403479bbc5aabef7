// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry of named navigation patterns and the site → pattern priority map.
//!
//! The built-in catalog is embedded at compile time from `patterns.json`.
//! A replacement catalog with the same shape can be loaded from disk, so
//! supporting a new site's menu markup never needs a code change.

use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_PATTERNS_JSON: &str = include_str!("patterns.json");

/// Dropdown sentinel: resolve the panel per item from its text.
pub const DYNAMIC_DROPDOWN: &str = "@dynamic";

/// How a pattern's dropdowns open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Hover,
    Click,
}

/// Container / trigger / dropdown selector triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSelectors {
    pub container: String,
    pub trigger: String,
    pub dropdown: String,
}

impl PatternSelectors {
    pub fn is_dynamic_dropdown(&self) -> bool {
        self.dropdown.trim() == DYNAMIC_DROPDOWN
    }
}

/// One site's menu markup convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationPattern {
    pub name: String,
    pub selectors: PatternSelectors,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub applicable_sites: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    patterns: Vec<NavigationPattern>,
    #[serde(default)]
    sites: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    generic_fallbacks: Vec<String>,
}

/// Immutable pattern registry, passed explicitly to the extraction driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCatalog {
    patterns: Vec<NavigationPattern>,
    sites: BTreeMap<String, Vec<String>>,
    generic_fallbacks: Vec<String>,
}

impl PatternCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<PatternCatalog> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                Self::from_json(BUILTIN_PATTERNS_JSON).unwrap_or_else(|e| {
                    tracing::error!("embedded pattern catalog is invalid: {e}");
                    Self::new(Vec::new(), BTreeMap::new(), Vec::new())
                })
            })
            .clone()
    }

    pub fn new(
        patterns: Vec<NavigationPattern>,
        sites: BTreeMap<String, Vec<String>>,
        generic_fallbacks: Vec<String>,
    ) -> Self {
        Self {
            patterns,
            sites,
            generic_fallbacks,
        }
    }

    /// Parse and validate a catalog document.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("pattern catalog: {e}")))?;

        let mut names = HashSet::new();
        for p in &file.patterns {
            if p.name.trim().is_empty() {
                return Err(EngineError::Config("pattern with empty name".into()));
            }
            if !names.insert(p.name.as_str()) {
                return Err(EngineError::Config(format!("duplicate pattern {}", p.name)));
            }
            let s = &p.selectors;
            if [&s.container, &s.trigger, &s.dropdown]
                .iter()
                .any(|sel| sel.trim().is_empty())
            {
                return Err(EngineError::Config(format!(
                    "pattern {} has an empty selector",
                    p.name
                )));
            }
        }
        let referenced = file
            .sites
            .values()
            .flatten()
            .chain(file.generic_fallbacks.iter());
        for name in referenced {
            if !names.contains(name.as_str()) {
                return Err(EngineError::Config(format!("unknown pattern {name}")));
            }
        }

        let sites = file
            .sites
            .into_iter()
            .map(|(site, names)| (site_key(&site), names))
            .collect();
        Ok(Self::new(file.patterns, sites, file.generic_fallbacks))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pattern catalog {}", path.display()))?;
        Ok(Self::from_json(&raw)?)
    }

    pub fn patterns(&self) -> &[NavigationPattern] {
        &self.patterns
    }

    pub fn get(&self, name: &str) -> Option<&NavigationPattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Candidate patterns for a site, in the order they should be tried:
    /// the site's own priority list, patterns declaring the site applicable,
    /// the generic fallbacks, then every remaining pattern. No name repeats.
    pub fn patterns_for_site(&self, site: &str) -> Vec<&NavigationPattern> {
        let key = site_key(site);
        let mut ordered: Vec<&str> = Vec::new();

        for (site_name, names) in &self.sites {
            if host_matches(&key, site_name) {
                ordered.extend(names.iter().map(String::as_str));
            }
        }
        for p in &self.patterns {
            if p.applicable_sites.iter().any(|s| host_matches(&key, &site_key(s))) {
                ordered.push(&p.name);
            }
        }
        ordered.extend(self.generic_fallbacks.iter().map(String::as_str));
        ordered.extend(self.patterns.iter().map(|p| p.name.as_str()));

        let mut seen = HashSet::new();
        ordered
            .into_iter()
            .filter(|name| seen.insert(*name))
            .filter_map(|name| self.get(name))
            .collect()
    }
}

/// Normalise a site identifier (bare host or full URL) to a lowercase host
/// without `www.`.
pub fn site_key(site: &str) -> String {
    let trimmed = site.trim();
    let host = url::Url::parse(trimmed)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| {
            trimmed
                .split(['/', '?', '#'])
                .next()
                .unwrap_or_default()
                .to_string()
        });
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

/// `shop.nike.com` matches `nike.com`; `notnike.com` does not.
fn host_matches(host: &str, site: &str) -> bool {
    host == site || host.ends_with(&format!(".{site}"))
}
