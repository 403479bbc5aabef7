// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Recursive category crawling from navigation seeds.

pub mod classifier;
pub mod explorer;

pub use classifier::{UrlClass, UrlClassifier};
pub use explorer::SubCategoryExplorer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a crawl starts: usually a navigation dropdown link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub navigation_path: Vec<String>,
}

impl SeedEntry {
    pub fn new(url: &str, name: &str, navigation_path: Vec<String>) -> Self {
        Self {
            url: url.to_string(),
            name: name.to_string(),
            navigation_path,
        }
    }

    /// Seed with a single-element navigation path.
    pub fn root(url: &str, name: &str) -> Self {
        Self::new(url, name, vec![name.to_string()])
    }
}

/// One expanded category page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub url: String,
    pub name: String,
    pub navigation_path: Vec<String>,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub is_leaf: bool,
    pub has_products: bool,
    /// Accepted subcategory links found on the page, before fan-out limits.
    pub subcategory_count: usize,
    /// Product cards and product links counted on the page.
    pub product_signals: usize,
    /// Container heuristic that produced the subcategory links.
    pub link_source: Option<String>,
}

/// An entry whose page could not be loaded or read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub url: String,
    pub depth: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub visited: usize,
    pub skipped_visited: usize,
    pub skipped_depth: usize,
    pub failed: usize,
    pub leaf_count: usize,
    pub duration_ms: u64,
}

/// Flat arena of crawled entries; `parent_url` links form the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryHierarchy {
    pub entries: Vec<CategoryEntry>,
    pub failures: Vec<CrawlFailure>,
    pub stats: CrawlStats,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

impl CategoryHierarchy {
    pub fn get(&self, url: &str) -> Option<&CategoryEntry> {
        self.entries.iter().find(|e| e.url == url)
    }

    pub fn roots(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.entries.iter().filter(|e| e.parent_url.is_none())
    }

    pub fn children_of<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a CategoryEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.parent_url.as_deref() == Some(url))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &CategoryEntry> {
        self.entries.iter().filter(|e| e.is_leaf)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
