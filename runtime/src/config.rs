// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Resolution order: explicit path, `AISLE_CONFIG`, then
//! `~/.aisle/config.json`, then built-in defaults.

use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "AISLE_CONFIG";

/// Navigation menu extraction timings and bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// How long to wait for the pattern's container to become visible.
    pub container_timeout_ms: u64,
    /// Hard limit on revealing one item's dropdown (hover + force-visibility).
    pub dropdown_timeout_ms: u64,
    /// Settle delay after hovering a static dropdown.
    pub hover_settle_ms: u64,
    /// Settle delay after hovering a dynamically rendered flyout.
    pub dynamic_settle_ms: u64,
    /// Settle delay after forcing a dropdown visible.
    pub force_settle_ms: u64,
    /// Timeout for locating an element to hover or click.
    pub action_timeout_ms: u64,
    /// Upper bound on top-level items per pattern.
    pub max_items: usize,
    /// Upper bound on links collected from one dropdown.
    pub max_dropdown_links: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            container_timeout_ms: 5_000,
            dropdown_timeout_ms: 10_000,
            hover_settle_ms: 400,
            dynamic_settle_ms: 900,
            force_settle_ms: 150,
            action_timeout_ms: 2_000,
            max_items: 40,
            max_dropdown_links: 400,
        }
    }
}

impl NavigationConfig {
    pub fn dropdown_timeout(&self) -> Duration {
        Duration::from_millis(self.dropdown_timeout_ms)
    }
}

/// Thresholds for accepting a navigation pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    pub max_patterns: usize,
    pub min_success_rate: f64,
    pub min_items: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_patterns: 8,
            min_success_rate: 0.5,
            min_items: 3,
        }
    }
}

/// Filter candidate discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDiscoveryConfig {
    pub score_threshold: u32,
    pub max_filters: usize,
    pub include_hidden: bool,
    /// Settle delay after clicking an "open filters" control.
    pub open_settle_ms: u64,
    pub action_timeout_ms: u64,
}

impl Default for FilterDiscoveryConfig {
    fn default() -> Self {
        Self {
            score_threshold: 2,
            max_filters: 25,
            include_hidden: false,
            open_settle_ms: 500,
            action_timeout_ms: 2_000,
        }
    }
}

/// Filter-driven product exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub apply_settle_ms: u64,
    pub remove_settle_ms: u64,
    pub max_products_per_filter: usize,
    pub navigation_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub title_min_len: usize,
    pub title_max_len: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            apply_settle_ms: 1_200,
            remove_settle_ms: 800,
            max_products_per_filter: 500,
            navigation_timeout_ms: 30_000,
            action_timeout_ms: 3_000,
            title_min_len: 3,
            title_max_len: 200,
        }
    }
}

/// Recursive subcategory crawling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_depth: u32,
    pub max_categories_per_level: usize,
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    /// Product-grid signals needed before a page counts as having products.
    pub min_product_signals: usize,
    pub same_host_only: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_categories_per_level: 12,
            navigation_timeout_ms: 30_000,
            settle_ms: 500,
            min_product_signals: 3,
            same_host_only: true,
        }
    }
}

/// Category deduplication thresholds. The defaults are starting points, not
/// derived values; tune them against representative catalogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub sample_size: usize,
    /// Jaccard overlap at or above which two categories are aliases.
    pub alias_threshold: f64,
    /// Share of a sibling's sample a category must cover to count as its superset.
    pub superset_threshold: f64,
    /// Covered siblings needed before a category is structural-only.
    pub min_covered_children: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            alias_threshold: 0.95,
            superset_threshold: 0.9,
            min_covered_children: 2,
        }
    }
}

/// All engine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub navigation: NavigationConfig,
    pub driver: DriverOptions,
    pub filters: FilterDiscoveryConfig,
    pub exploration: ExplorationConfig,
    pub crawl: CrawlConfig,
    pub dedup: DedupConfig,
}

impl EngineConfig {
    /// Resolve and load the configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(EngineError::Config(format!("{name} must be within 0..=1, got {v}")))
            }
        };
        unit("driver.min_success_rate", self.driver.min_success_rate)?;
        unit("dedup.alias_threshold", self.dedup.alias_threshold)?;
        unit("dedup.superset_threshold", self.dedup.superset_threshold)?;
        if self.driver.max_patterns == 0 {
            return Err(EngineError::Config("driver.max_patterns must be > 0".into()));
        }
        if self.dedup.sample_size == 0 {
            return Err(EngineError::Config("dedup.sample_size must be > 0".into()));
        }
        if self.exploration.title_min_len > self.exploration.title_max_len {
            return Err(EngineError::Config(
                "exploration.title_min_len exceeds title_max_len".into(),
            ));
        }
        Ok(())
    }
}

/// Pick the config file to load, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let home_config = dirs::home_dir()?.join(".aisle/config.json");
    home_config.exists().then_some(home_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "navigation": {{ "dropdown_timeout_ms": 2500 }}, "dedup": {{ "alias_threshold": 0.99 }} }}"#
        )
        .unwrap();

        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.navigation.dropdown_timeout_ms, 2500);
        assert_eq!(config.navigation.hover_settle_ms, 400);
        assert_eq!(config.dedup.alias_threshold, 0.99);
        assert_eq!(config.crawl, CrawlConfig::default());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dedup": {{ "superset_threshold": 1.5 }} }}"#).unwrap();
        let err = EngineConfig::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("superset_threshold"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/explicit.json");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(EngineConfig::load(Some(Path::new("/nonexistent/aisle.json"))).is_err());
    }

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert_eq!(
            NavigationConfig::default().dropdown_timeout(),
            Duration::from_secs(10)
        );
    }
}
