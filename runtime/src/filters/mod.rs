// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filter discovery and filter-driven product exploration.

pub mod discovery;
pub mod exploration;
pub mod product;
pub mod scoring;

pub use discovery::{DiscoveryResult, DiscoveryStats, FilterDiscoveryEngine};
pub use exploration::{CategoryExploration, FilterExplorationEngine, FilterPath, FilterState};
pub use product::{DiscoveredProduct, Price, ProductAccumulator};

use crate::error::EngineError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_VOCABULARY_JSON: &str = include_str!("vocabulary.json");

/// What kind of control a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Checkbox,
    Radio,
    Button,
    Link,
}

/// A clickable element hypothesised to be a product filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCandidate {
    pub element_type: ElementKind,
    /// Structural, CSS-escaped selector for the element.
    pub selector: String,
    pub label: String,
    pub name: Option<String>,
    pub value: Option<String>,
    pub href: Option<String>,
    /// Checked, pressed or otherwise marked active when discovered.
    pub active: bool,
    /// Selector of the filter container the element was found in.
    pub container_hint: Option<String>,
    /// The link carries recognisable facet query parameters.
    pub facet_link: bool,
    pub visible: bool,
    pub score: u32,
}

impl FilterCandidate {
    /// The label without a trailing result count: `Red (4)` → `Red`.
    pub fn display_label(&self) -> String {
        scoring::strip_count_suffix(&self.label)
    }
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    open_filters: Vec<String>,
    open_filter_text: String,
    containers: Vec<String>,
    facet_params: Vec<String>,
    #[serde(default)]
    facet_param_prefixes: Vec<String>,
    filterish: String,
    exclusions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    label_exclusions: BTreeMap<String, Vec<String>>,
}

/// A named exclusion rule.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pub group: String,
    pub pattern: Regex,
    /// Whole-text shapes (`XL`, `42`, `$10 - $20`) that only make sense
    /// against the visible label, never against ids in `name`/`value`.
    pub label_only: bool,
}

/// Selectors and word lists driving filter discovery.
#[derive(Debug, Clone)]
pub struct FilterVocabulary {
    pub open_filters: Vec<String>,
    pub open_filter_text: Regex,
    pub containers: Vec<String>,
    pub facet_params: Vec<String>,
    pub facet_param_prefixes: Vec<String>,
    pub filterish: Regex,
    pub exclusions: Vec<ExclusionRule>,
}

impl FilterVocabulary {
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<FilterVocabulary> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                Self::from_json(BUILTIN_VOCABULARY_JSON).unwrap_or_else(|e| {
                    tracing::error!("embedded filter vocabulary is invalid: {e}");
                    Self::empty()
                })
            })
            .clone()
    }

    fn empty() -> Self {
        let never = Regex::new(r"\b\B").expect("never-matching regex is valid");
        Self {
            open_filters: Vec::new(),
            open_filter_text: never.clone(),
            containers: Vec::new(),
            facet_params: Vec::new(),
            facet_param_prefixes: Vec::new(),
            filterish: never,
            exclusions: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: VocabularyFile = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("filter vocabulary: {e}")))?;
        let compile = |p: &str| {
            Regex::new(p)
                .map_err(|e| EngineError::Config(format!("filter vocabulary pattern {p}: {e}")))
        };

        let mut exclusions = Vec::new();
        let sections = [(&file.exclusions, false), (&file.label_exclusions, true)];
        for (section, label_only) in sections {
            for (group, patterns) in section {
                for p in patterns {
                    exclusions.push(ExclusionRule {
                        group: group.clone(),
                        pattern: compile(p)?,
                        label_only,
                    });
                }
            }
        }

        Ok(Self {
            open_filters: file.open_filters,
            open_filter_text: compile(&file.open_filter_text)?,
            containers: file.containers,
            facet_params: file.facet_params.iter().map(|p| p.to_ascii_lowercase()).collect(),
            facet_param_prefixes: file
                .facet_param_prefixes
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
            filterish: compile(&file.filterish)?,
            exclusions,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read filter vocabulary {}", path.display()))?;
        Ok(Self::from_json(&raw)?)
    }

    /// True when `name` looks like a facet query parameter.
    pub fn is_facet_param(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let base = lower.split('[').next().unwrap_or_default();
        self.facet_params.iter().any(|p| p == base)
            || self.facet_param_prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }

    /// True when `url` carries at least one facet query parameter.
    pub fn has_facet_params(&self, url: &str) -> bool {
        url::Url::parse(url)
            .map(|u| u.query_pairs().any(|(k, _)| self.is_facet_param(&k)))
            .unwrap_or(false)
    }

    /// The first exclusion group matching `label`, or matching one of
    /// `attributes` through a rule that is not label-only.
    pub fn exclusion_group(&self, label: &str, attributes: &[&str]) -> Option<&str> {
        let hits = |rule: &ExclusionRule, text: &str| {
            let text = text.trim();
            !text.is_empty() && rule.pattern.is_match(text)
        };
        self.exclusions
            .iter()
            .find(|rule| {
                hits(rule, label) || (!rule.label_only && attributes.iter().any(|t| hits(rule, t)))
            })
            .map(|rule| rule.group.as_str())
    }
}
