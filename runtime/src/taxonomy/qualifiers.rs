// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Taxonomy qualifiers inferred from category slugs.
//!
//! A vocabulary maps dimensions (`gender`, `type`, ...) to canonical values,
//! each with the slug tokens that imply it. Multi-token terms such as
//! `t-shirts` match as contiguous token runs.

use super::slug::{slugify, tokens};
use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_VOCABULARY_JSON: &str = include_str!("vocabulary.json");

/// Dimension → canonical value, e.g. `{"gender": "men", "type": "tops"}`.
pub type Qualifiers = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    dimensions: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// One term: the canonical value it implies and its slug tokens.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    value: String,
    tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyVocabulary {
    /// Terms per dimension, longest first so `t-shirts` beats `shirts`.
    dimensions: BTreeMap<String, Vec<Term>>,
}

impl TaxonomyVocabulary {
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<TaxonomyVocabulary> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                Self::from_json(BUILTIN_VOCABULARY_JSON).unwrap_or_else(|e| {
                    tracing::error!("embedded taxonomy vocabulary is invalid: {e}");
                    Self {
                        dimensions: BTreeMap::new(),
                    }
                })
            })
            .clone()
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: VocabularyFile = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("taxonomy vocabulary: {e}")))?;

        let dimensions = file
            .dimensions
            .into_iter()
            .map(|(dimension, values)| {
                let mut terms: Vec<Term> = values
                    .into_iter()
                    .flat_map(|(value, words)| {
                        words.into_iter().map(move |w| Term {
                            value: value.clone(),
                            tokens: tokens(&slugify(&w)).into_iter().map(String::from).collect(),
                        })
                    })
                    .filter(|t| !t.tokens.is_empty())
                    .collect();
                terms.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));
                (dimension, terms)
            })
            .collect();
        Ok(Self { dimensions })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read taxonomy vocabulary {}", path.display()))?;
        Ok(Self::from_json(&raw)?)
    }

    /// Qualifiers present in `slug`. Per dimension, the term occurring
    /// earliest in the slug wins; longer terms win ties at the same position.
    pub fn qualifiers(&self, slug: &str) -> Qualifiers {
        let words = tokens(slug);
        let mut found = Qualifiers::new();

        for (dimension, terms) in &self.dimensions {
            let mut best: Option<(usize, &str)> = None;
            for term in terms {
                if let Some(pos) = find_run(&words, &term.tokens) {
                    if best.map_or(true, |(p, _)| pos < p) {
                        best = Some((pos, &term.value));
                    }
                }
            }
            if let Some((_, value)) = best {
                found.insert(dimension.clone(), value.to_string());
            }
        }
        found
    }
}

fn find_run(words: &[&str], run: &[String]) -> Option<usize> {
    if run.is_empty() || run.len() > words.len() {
        return None;
    }
    words
        .windows(run.len())
        .position(|w| w.iter().zip(run).all(|(a, b)| *a == b.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str) -> Qualifiers {
        TaxonomyVocabulary::builtin().qualifiers(&slugify(name))
    }

    #[test]
    fn test_gender_and_type() {
        let quals = q("Men's T-Shirts");
        assert_eq!(quals.get("gender").map(String::as_str), Some("men"));
        assert_eq!(quals.get("type").map(String::as_str), Some("tops"));
    }

    #[test]
    fn test_women_not_matched_as_men() {
        let quals = q("Womens Jeans");
        assert_eq!(quals.get("gender").map(String::as_str), Some("women"));
        assert_eq!(quals.get("type").map(String::as_str), Some("bottoms"));
    }

    #[test]
    fn test_generic_names_have_no_qualifiers() {
        assert!(q("All Clothing").is_empty());
        assert_eq!(q("Tops").len(), 1);
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = TaxonomyVocabulary::from_json(
            r#"{"dimensions": {"season": {"summer": ["summer", "ss"]}}}"#,
        )
        .unwrap();
        let quals = vocab.qualifiers("ss-collection");
        assert_eq!(quals.get("season").map(String::as_str), Some("summer"));
        assert!(TaxonomyVocabulary::from_json("{}").is_err());
    }
}
