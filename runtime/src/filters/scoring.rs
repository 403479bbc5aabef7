// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Candidate scoring, ranking and exclusion. No DOM access here.

use super::{ElementKind, FilterCandidate, FilterVocabulary};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn count_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*[(\[]\s*\d[\d,.\s]*\s*[)\]]\s*$").expect("count suffix regex is valid")
    })
}

/// `Brand (12)`, `Red [4]`.
pub fn has_count_suffix(label: &str) -> bool {
    count_suffix_re().is_match(label)
}

pub fn strip_count_suffix(label: &str) -> String {
    count_suffix_re().replace(label, "").trim().to_string()
}

/// Base score by element kind.
pub fn base_score(kind: ElementKind, facet_link: bool) -> u32 {
    match kind {
        ElementKind::Checkbox | ElementKind::Radio => 2,
        ElementKind::Button => 1,
        ElementKind::Link if facet_link => 2,
        ElementKind::Link => 0,
    }
}

/// Score one candidate.
pub fn score(candidate: &FilterCandidate, vocab: &FilterVocabulary) -> u32 {
    let mut score = base_score(candidate.element_type, candidate.facet_link);
    if candidate.container_hint.is_some() {
        score += 1;
    }
    if has_count_suffix(&candidate.label) {
        score += 1;
    }
    if candidate.active {
        score += 1;
    }
    let filterish = [candidate.name.as_deref(), candidate.value.as_deref()]
        .into_iter()
        .flatten()
        .any(|t| vocab.filterish.is_match(t));
    if filterish {
        score += 1;
    }
    score
}

/// Counters from [`rank`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankStats {
    pub below_threshold: usize,
    pub hidden: usize,
}

/// Score every candidate, drop those under `threshold` or hidden (unless
/// `include_hidden`), and sort by score descending. Ties keep page order.
pub fn rank(
    mut candidates: Vec<FilterCandidate>,
    vocab: &FilterVocabulary,
    threshold: u32,
    include_hidden: bool,
) -> (Vec<FilterCandidate>, RankStats) {
    let mut stats = RankStats::default();
    for c in &mut candidates {
        c.score = score(c, vocab);
    }
    let mut kept: Vec<FilterCandidate> = candidates
        .into_iter()
        .filter(|c| {
            if c.score < threshold {
                stats.below_threshold += 1;
                false
            } else if !c.visible && !include_hidden {
                stats.hidden += 1;
                false
            } else {
                true
            }
        })
        .collect();
    kept.sort_by(|a, b| b.score.cmp(&a.score));
    (kept, stats)
}

/// Result of the exclusion pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionOutcome {
    pub kept: Vec<FilterCandidate>,
    /// `(label, rule group)` for every candidate the rules matched.
    pub excluded: Vec<(String, String)>,
    /// Exclusion would have emptied the list, so it was not applied.
    pub fallback_used: bool,
}

/// Drop candidates whose label matches an exclusion rule, or whose name or
/// value matches a word rule, unless that would leave nothing.
pub fn apply_exclusions(
    candidates: Vec<FilterCandidate>,
    vocab: &FilterVocabulary,
) -> ExclusionOutcome {
    let mut kept = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();

    for c in &candidates {
        let label = c.display_label();
        let attributes = [
            c.name.as_deref().unwrap_or_default(),
            c.value.as_deref().unwrap_or_default(),
        ];
        match vocab.exclusion_group(&label, &attributes) {
            Some(group) => excluded.push((c.label.clone(), group.to_string())),
            None => kept.push(c.clone()),
        }
    }

    if kept.is_empty() && !candidates.is_empty() {
        return ExclusionOutcome {
            kept: candidates,
            excluded,
            fallback_used: true,
        };
    }
    ExclusionOutcome {
        kept,
        excluded,
        fallback_used: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str) -> FilterCandidate {
        FilterCandidate {
            element_type: ElementKind::Checkbox,
            selector: format!("#{}", label.to_lowercase().replace(' ', "-")),
            label: label.to_string(),
            name: None,
            value: None,
            href: None,
            active: false,
            container_hint: Some("#filters".into()),
            facet_link: false,
            visible: true,
            score: 0,
        }
    }

    #[test]
    fn test_count_suffix() {
        assert!(has_count_suffix("Brand (12)"));
        assert!(has_count_suffix("Red [1,204]"));
        assert!(!has_count_suffix("Size 12"));
        assert_eq!(strip_count_suffix("Red (4)"), "Red");
    }

    #[test]
    fn test_scoring_components() {
        let vocab = FilterVocabulary::builtin();
        let mut c = candidate("Nike (12)");
        // checkbox 2 + container 1 + count 1
        assert_eq!(score(&c, &vocab), 4);
        c.active = true;
        c.name = Some("brand".into());
        assert_eq!(score(&c, &vocab), 6);

        let mut link = candidate("Sale");
        link.element_type = ElementKind::Link;
        link.container_hint = None;
        assert_eq!(score(&link, &vocab), 0);
        link.facet_link = true;
        assert_eq!(score(&link, &vocab), 2);

        let mut button = candidate("Blue");
        button.element_type = ElementKind::Button;
        button.container_hint = None;
        assert_eq!(score(&button, &vocab), 1);
    }

    #[test]
    fn test_rank_threshold_visibility_and_order() {
        let vocab = FilterVocabulary::builtin();
        let mut hidden = candidate("Hidden");
        hidden.visible = false;
        let mut weak = candidate("Weak");
        weak.element_type = ElementKind::Button;
        weak.container_hint = None;
        let strong = candidate("Strong (3)");

        let (ranked, stats) = rank(
            vec![candidate("Plain"), hidden.clone(), weak, strong],
            &vocab,
            2,
            false,
        );
        let labels: Vec<_> = ranked.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Strong (3)", "Plain"]);
        assert_eq!(stats.below_threshold, 1);
        assert_eq!(stats.hidden, 1);

        let (with_hidden, _) = rank(vec![hidden], &vocab, 2, true);
        assert_eq!(with_hidden.len(), 1);
    }

    #[test]
    fn test_exclusion_keeps_brand_and_category_filters() {
        let vocab = FilterVocabulary::builtin();
        let input = ["In Stock", "ACCESSORIES", "Price Range", "NIKE"]
            .into_iter()
            .map(candidate)
            .collect();
        let outcome = apply_exclusions(input, &vocab);
        let labels: Vec<_> = outcome.kept.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["ACCESSORIES", "NIKE"]);
        assert!(!outcome.fallback_used);
        assert_eq!(outcome.excluded.len(), 2);
    }

    #[test]
    fn test_exclusion_never_empties_the_list() {
        let vocab = FilterVocabulary::builtin();
        let input = vec![candidate("XL"), candidate("Sort by")];
        let outcome = apply_exclusions(input, &vocab);
        assert_eq!(outcome.kept.len(), 2);
        assert!(outcome.fallback_used);

        let empty = apply_exclusions(Vec::new(), &vocab);
        assert!(empty.kept.is_empty() && !empty.fallback_used);
    }
}
