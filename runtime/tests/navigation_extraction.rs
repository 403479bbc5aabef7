// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Menu extraction against fixture storefronts: per-item isolation, the
//! dropdown race, and pattern fallback.

use aisle_runtime::budget::Deadline;
use aisle_runtime::config::{DriverOptions, NavigationConfig};
use aisle_runtime::navigation::{
    NavigationExtractor, PatternCatalog, RedundantExtractionDriver, RevealMethod,
};
use aisle_runtime::renderer::fixture::{FixturePage, FixtureSite};
use aisle_runtime::renderer::{RenderContext, WaitPolicy};
use std::time::Duration;

const HOME: &str = "https://shop.test/";

fn fast_config() -> NavigationConfig {
    NavigationConfig {
        hover_settle_ms: 0,
        dynamic_settle_ms: 0,
        force_settle_ms: 0,
        ..Default::default()
    }
}

/// Seven mega-menu entries; "Gift Cards" has no link to act as a trigger.
fn mega_menu_home() -> String {
    let mut items = String::new();
    for (i, name) in ["Women", "Men", "Kids", "Home", "Beauty", "Sale"].iter().enumerate() {
        let slug = name.to_lowercase();
        items.push_str(&format!(
            r#"<li class="menu-item-has-children" id="m{n}">
                 <a href="/c/{slug}">{name}</a>
                 <div class="sub-menu" style="display:none">
                   <ul>
                     <li><a href="/c/{slug}/new">New In</a>
                       <ul><li><a href="/c/{slug}/new/this-week">This Week</a></li></ul>
                     </li>
                     <li><a href="/c/{slug}/all">Shop All</a></li>
                   </ul>
                 </div>
               </li>"#,
            n = i + 1
        ));
    }
    items.push_str(r#"<li class="menu-item-has-children" id="m7"><span>Gift Cards</span></li>"#);
    format!(
        r#"<html><body><nav><div class="wrap"><div class="menu"><ul>{items}</ul></div></div></nav></body></html>"#
    )
}

fn hover_site() -> FixtureSite {
    let mut site = FixtureSite::new().page(HOME, &mega_menu_home());
    // "Sale" (m6) has no hover behaviour and must be forced open.
    for n in 1..=5 {
        site = site.hover_reveal(&format!("#m{n}"), &format!("#m{n} .sub-menu"));
    }
    site
}

async fn open(site: FixtureSite) -> FixturePage {
    let mut page = FixturePage::new(site);
    page.navigate(HOME, WaitPolicy::Load, 1_000).await.unwrap();
    page
}

#[tokio::test]
async fn test_entry_without_trigger_is_skipped_not_fatal() {
    let page = open(hover_site()).await;
    let catalog = PatternCatalog::builtin();
    let pattern = catalog.get("mega-menu-li").unwrap();

    let result = NavigationExtractor::new(fast_config())
        .extract(&page, pattern, Deadline::none())
        .await;

    assert!(result.success);
    assert_eq!(result.main_navigation.container_matches, 7);
    assert_eq!(result.main_navigation.count, 6);
    assert_eq!(result.main_navigation.skipped_missing_trigger, 1);
    assert_eq!(result.dropdowns.len(), 6);
    assert_eq!(result.stats.total_items, 6);
}

#[tokio::test]
async fn test_hover_then_force_visibility() {
    let page = open(hover_site()).await;
    let catalog = PatternCatalog::builtin();
    let result = NavigationExtractor::new(fast_config())
        .extract(&page, catalog.get("mega-menu-li").unwrap(), Deadline::none())
        .await;

    for dd in &result.dropdowns[..5] {
        assert_eq!(dd.method(), RevealMethod::Hover, "{}", dd.item_text);
        assert_eq!(dd.count(), 3);
    }
    let sale = &result.dropdowns[5];
    assert_eq!(sale.item_text, "Sale");
    assert_eq!(sale.method(), RevealMethod::ForceVisibility);
    assert_eq!(sale.strategy_used(), Some("display:block"));

    let links = sale.items();
    assert_eq!(links[0].text, "New In");
    assert_eq!(links[0].depth, 0);
    assert_eq!(links[1].text, "This Week");
    assert_eq!(links[1].depth, 1);
    assert_eq!(links[1].href, "https://shop.test/c/sale/new/this-week");

    assert_eq!(result.stats.successful_items, 6);
    assert_eq!(result.stats.methods.hover, 5);
    assert_eq!(result.stats.methods.force_visibility, 1);
    assert_eq!(result.stats.total_links, 18);
    assert!((result.stats.success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_empty_dropdown_is_a_timeout_with_reset() {
    let html = r#"<html><body><nav><ul>
        <li class="menu-item-has-children" id="m1">
          <a href="/c/women">Women</a>
          <div class="sub-menu" style="display:none"></div>
        </li>
        <li class="menu-item-has-children" id="m2"><a href="/c/men">Men</a></li>
      </ul></nav></body></html>"#;
    let site = FixtureSite::new()
        .page(HOME, html)
        .hover_reveal("#m1", "#m1 .sub-menu");
    let page = open(site).await;
    let catalog = PatternCatalog::builtin();
    let result = NavigationExtractor::new(fast_config())
        .extract(&page, catalog.get("mega-menu-li").unwrap(), Deadline::none())
        .await;

    assert_eq!(result.dropdowns.len(), 2);
    let women = &result.dropdowns[0];
    assert_eq!(women.method(), RevealMethod::Timeout);
    assert!(women.error().unwrap().contains("10000ms"));

    // No dropdown element at all is a real failure, not a timeout.
    let men = &result.dropdowns[1];
    assert_eq!(men.method(), RevealMethod::Error);
    assert!(men.error().unwrap().contains("selector not found"));

    // One reset before each item, one after the empty reveal, one at the end.
    let resets = page
        .action_log()
        .iter()
        .filter(|a| a.starts_with("mouse "))
        .count();
    assert_eq!(resets, 4);
    assert_eq!(result.stats.methods.failed, 2);
}

#[tokio::test]
async fn test_slow_hover_loses_the_race() {
    let page = open(hover_site().hover_delay(Duration::from_millis(300))).await;
    let catalog = PatternCatalog::builtin();
    let config = NavigationConfig {
        dropdown_timeout_ms: 50,
        ..fast_config()
    };
    let result = NavigationExtractor::new(config)
        .extract(&page, catalog.get("mega-menu-li").unwrap(), Deadline::none())
        .await;

    assert!(result.success);
    assert_eq!(result.dropdowns.len(), 6);
    for dd in &result.dropdowns {
        assert_eq!(dd.method(), RevealMethod::Timeout);
        assert!(!dd.success());
        assert!(dd.error().unwrap().contains("50ms"));
    }
    assert_eq!(result.stats.successful_items, 0);
    assert_eq!(result.stats.methods.failed, 6);
}

#[tokio::test]
async fn test_missing_container_fails_the_pattern_only() {
    let page = open(hover_site()).await;
    let catalog = PatternCatalog::builtin();
    let result = NavigationExtractor::new(fast_config())
        .extract(&page, catalog.get("aria-menubar").unwrap(), Deadline::none())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("no main navigation items"));
    assert!(result.dropdowns.is_empty());
}

#[tokio::test]
async fn test_driver_falls_back_to_matching_pattern() {
    let mut page = open(FixtureSite::new().page(HOME, &mega_menu_home())).await;
    let driver = RedundantExtractionDriver::new(
        PatternCatalog::builtin(),
        NavigationExtractor::new(fast_config()),
        DriverOptions::default(),
    );

    let outcome = driver
        .extract_with_fallback(&mut page, "shop.test", Deadline::none())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.pattern_used.as_deref(), Some("mega-menu-li"));
    let tried: Vec<&str> = outcome.attempts.iter().map(|a| a.pattern.as_str()).collect();
    assert_eq!(
        tried,
        vec![
            "header-nav-ul-li",
            "generic-nav-li",
            "generic-header-links",
            "aria-menubar",
            "mega-menu-li"
        ]
    );
    assert_eq!(outcome.fallbacks_used, 4);
    assert!(outcome.attempts[..4].iter().all(|a| !a.qualified));

    let seeds = outcome.seed_entries();
    assert_eq!(seeds.len(), 18);
    assert_eq!(seeds[0].navigation_path, vec!["Women", "New In"]);
}

#[tokio::test]
async fn test_driver_reports_exhaustion() {
    let maintenance = "<html><body><p>maintenance</p></body></html>";
    let mut page = open(FixtureSite::new().page(HOME, maintenance)).await;
    let driver = RedundantExtractionDriver::new(
        PatternCatalog::builtin(),
        NavigationExtractor::new(fast_config()),
        DriverOptions {
            max_patterns: 3,
            ..Default::default()
        },
    );

    let outcome = driver
        .extract_with_fallback(&mut page, "shop.test", Deadline::none())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts.len(), 3);
    assert!(outcome.error.as_ref().unwrap().contains("no pattern met the thresholds"));
    assert!(outcome.seed_entries().is_empty());
}

#[tokio::test]
async fn test_expired_deadline_cancels_before_first_pattern() {
    let mut page = open(hover_site()).await;
    let driver = RedundantExtractionDriver::new(
        PatternCatalog::builtin(),
        NavigationExtractor::new(fast_config()),
        DriverOptions::default(),
    );
    let deadline = Deadline::at(std::time::Instant::now() - Duration::from_millis(1));

    let outcome = driver.extract_with_fallback(&mut page, "shop.test", deadline).await;
    assert!(outcome.cancelled);
    assert!(outcome.attempts.is_empty());
    assert!(!outcome.success);
}
