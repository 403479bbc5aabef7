// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! URL classification for category crawling and product capture.

use crate::navigation::catalog::site_key;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Path and query shapes that usually mark a category listing.
const CATEGORY_PATTERNS: &[&str] = &[
    r"/categor(?:y|ies)/",
    r"/c/",
    r"/cat/",
    r"/shop/",
    r"/collections?/",
    r"/departments?/",
    r"/browse/",
    r"/catalog/",
    r"/(?:men|mens|women|womens|kids|girls|boys|baby)(?:/|-|$)",
    r"[-/]c\d{3,}(?:\.html)?$",
    r"[?&](?:cat|category|category_id|catid)=",
];

/// Product detail pages.
const PRODUCT_PATTERNS: &[&str] = &[
    r"/products?/",
    r"/p/",
    r"/item/",
    r"/dp/",
    r"/pd/",
    r"[-/]p\d{5,}(?:\.html)?$",
    r"[?&](?:pid|product_id|sku)=",
];

/// Never crawled: non-page resources and account/checkout flows.
const EXCLUDE_PATTERNS: &[&str] = &[
    r"(?i)\.(?:jpe?g|png|gif|svg|webp|avif|ico|css|js|json|xml|pdf|zip|woff2?|ttf|mp4)(?:[?#]|$)",
    r"(?i)/(?:account|cart|basket|bag|checkout|login|log-in|signin|sign-in|register|wishlist|favourites|help|customer-service|stores?|store-locator)(?:/|$|\?)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlClass {
    Category,
    Product,
    /// Asset, script, account page or unsupported scheme.
    Excluded,
    /// Different site.
    Foreign,
    /// A same-site page matching no pattern.
    Other,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = p, "invalid url pattern: {e}");
                None
            }
        })
        .collect()
}

/// Regex-driven classifier. Patterns match against the path and query of the
/// lowercased URL.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    include: Vec<Regex>,
    product: Vec<Regex>,
    exclude: Vec<Regex>,
    same_host_only: bool,
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl UrlClassifier {
    pub fn new(same_host_only: bool) -> Self {
        static DEFAULTS: OnceLock<(Vec<Regex>, Vec<Regex>, Vec<Regex>)> = OnceLock::new();
        let (include, product, exclude) = DEFAULTS
            .get_or_init(|| {
                (
                    compile(CATEGORY_PATTERNS),
                    compile(PRODUCT_PATTERNS),
                    compile(EXCLUDE_PATTERNS),
                )
            })
            .clone();
        Self {
            include,
            product,
            exclude,
            same_host_only,
        }
    }

    /// Add extra include patterns (site-specific category URL shapes).
    pub fn with_include(mut self, patterns: &[&str]) -> Self {
        self.include.extend(compile(patterns));
        self
    }

    /// Classify `url` as seen from a page on `base`.
    pub fn classify(&self, url: &str, base: &str) -> UrlClass {
        let trimmed = url.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.is_empty()
            || lower.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            return UrlClass::Excluded;
        }
        let Ok(parsed) = url::Url::parse(trimmed) else {
            return UrlClass::Excluded;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return UrlClass::Excluded;
        }
        if self.same_host_only && !same_site(&parsed, base) {
            return UrlClass::Foreign;
        }

        let mut target = parsed.path().to_ascii_lowercase();
        if let Some(q) = parsed.query() {
            target.push('?');
            target.push_str(&q.to_ascii_lowercase());
        }

        if self.exclude.iter().any(|re| re.is_match(&target)) {
            UrlClass::Excluded
        } else if self.product.iter().any(|re| re.is_match(&target)) {
            UrlClass::Product
        } else if self.include.iter().any(|re| re.is_match(&target)) {
            UrlClass::Category
        } else {
            UrlClass::Other
        }
    }

    pub fn is_category(&self, url: &str, base: &str) -> bool {
        self.classify(url, base) == UrlClass::Category
    }

    pub fn is_product(&self, url: &str, base: &str) -> bool {
        self.classify(url, base) == UrlClass::Product
    }
}

fn same_site(url: &url::Url, base: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    site_key(host) == site_key(base)
}

/// `child` sits strictly below `parent` in the path hierarchy.
pub fn is_sub_path(child: &str, parent: &str) -> bool {
    let (Ok(c), Ok(p)) = (url::Url::parse(child), url::Url::parse(parent)) else {
        return false;
    };
    if c.host_str() != p.host_str() {
        return false;
    }
    let parent_path = p.path().trim_end_matches('/');
    let child_path = c.path().trim_end_matches('/');
    child_path.len() > parent_path.len()
        && child_path.starts_with(parent_path)
        && child_path.as_bytes().get(parent_path.len()) == Some(&b'/')
}
