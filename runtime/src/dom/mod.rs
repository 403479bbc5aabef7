// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed DOM query language shared by every page backend.
//!
//! Engines never ship ad-hoc scripts into the page. They describe what they
//! want as a [`DomQuery`] ("elements matching this selector, optionally inside
//! these scopes, with these attributes") and receive [`ElementSnapshot`]s back.
//! Everything that can be decided without the live DOM (selector derivation,
//! visibility, label and title resolution) happens in Rust over snapshots.

pub mod selector;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use selector::{css_escape, scoped, split_selector_list, structural_selector};

/// A read-only element query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomQuery {
    /// CSS selector for the elements to return.
    pub selector: String,
    /// Restrict matches to descendants of elements matching this selector.
    pub within: Option<String>,
    /// Extra attributes to read (`id` and `class` are always read).
    pub attributes: Vec<String>,
    /// Maximum number of snapshots to return.
    pub limit: Option<usize>,
    /// Collect `label[for]`, enclosing `<label>` and sibling text.
    pub label_hints: bool,
    /// Collect text, price and image from the closest product-card ancestor.
    pub card_context: bool,
}

impl DomQuery {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    pub fn within(mut self, scope: impl Into<String>) -> Self {
        self.within = Some(scope.into());
        self
    }

    pub fn attrs(mut self, names: &[&str]) -> Self {
        self.attributes
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn with_label_hints(mut self) -> Self {
        self.label_hints = true;
        self
    }

    pub fn with_card_context(mut self) -> Self {
        self.card_context = true;
        self
    }
}

/// The subset of computed style the engines reason about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    /// `display != none && visibility != hidden && opacity > 0`.
    pub fn is_visible(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.opacity > 0.0
    }
}

/// Element box in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// One step of an element's ancestry, root first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub tag: String,
    pub id: Option<String>,
    /// 1-based position among element siblings with the same tag.
    pub nth_of_type: usize,
}

/// Raw material for resolving a form control's human label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelHints {
    /// Text of `label[for=<id>]`.
    pub label_for: Option<String>,
    /// Text of the closest enclosing `<label>`.
    pub enclosing_label: Option<String>,
    /// Text of the next (or previous) sibling element or text node.
    pub sibling_text: Option<String>,
}

/// Context gathered from the product card around a listing anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardContext {
    /// Title-ish texts: headings, `[class*=title]`, `[class*=name]`, image alt.
    pub texts: Vec<String>,
    pub price_text: Option<String>,
    pub image: Option<String>,
}

/// What a backend reports about one matched element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    pub tag: String,
    /// Visible text, whitespace collapsed.
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    /// Absolute `href` for anchors, already resolved against the document.
    pub href: Option<String>,
    /// Live `checked` property for inputs.
    pub checked: bool,
    pub style: ComputedStyle,
    pub bounding_box: Option<BoundingBox>,
    pub ancestry: Vec<PathSegment>,
    pub label_hints: Option<LabelHints>,
    pub card: Option<CardContext>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|s| !s.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// Unique-enough CSS path for re-locating this element later.
    pub fn selector(&self) -> String {
        structural_selector(&self.ancestry)
    }

    /// Visible by computed style, and not collapsed to a zero box when the
    /// backend reports geometry.
    pub fn is_visible(&self) -> bool {
        self.style.is_visible() && self.bounding_box.map_or(true, |b| !b.is_empty())
    }
}

/// Collapse runs of whitespace and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_visibility_rules() {
        let mut style = ComputedStyle::default();
        assert!(style.is_visible());
        style.opacity = 0.0;
        assert!(!style.is_visible());
        style.opacity = 0.4;
        style.visibility = "hidden".into();
        assert!(!style.is_visible());
        style.visibility = "visible".into();
        style.display = "none".into();
        assert!(!style.is_visible());
    }

    #[test]
    fn test_zero_box_is_hidden() {
        let snap = ElementSnapshot {
            bounding_box: Some(BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 0.0,
                height: 12.0,
            }),
            ..Default::default()
        };
        assert!(!snap.is_visible());
    }

    #[test]
    fn test_query_builder() {
        let q = DomQuery::new("a[href]")
            .within("nav")
            .attrs(&["aria-label"])
            .limit(5)
            .with_card_context();
        assert_eq!(q.within.as_deref(), Some("nav"));
        assert_eq!(q.attributes, vec!["aria-label".to_string()]);
        assert_eq!(q.limit, Some(5));
        assert!(q.card_context);
        assert!(!q.label_hints);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Men's \n\t Shoes  "), "Men's Shoes");
    }
}
