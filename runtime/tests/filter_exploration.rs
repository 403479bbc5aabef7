// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filter exploration over a fixture category whose filters are facet links.

use aisle_runtime::budget::Deadline;
use aisle_runtime::config::{ExplorationConfig, FilterDiscoveryConfig};
use aisle_runtime::filters::exploration::{Activation, Removal};
use aisle_runtime::filters::{
    FilterDiscoveryEngine, FilterExplorationEngine, FilterState, FilterVocabulary,
};
use aisle_runtime::renderer::fixture::{FixturePage, FixtureSite};
use std::time::{Duration, Instant};

const CATEGORY: &str = "https://a.com/c/shoes";

const FILTER_PANEL: &str = r#"
    <aside class="filters">
      <a href="/c/shoes?color=red">Red</a>
      <a href="/c/shoes?color=blue">Blue</a>
      <a href="/c/shoes?filter=in-stock">In Stock</a>
    </aside>"#;

fn page(products: &str) -> String {
    format!(r#"<html><body>{FILTER_PANEL}<main><div class="grid">{products}</div></main></body></html>"#)
}

fn card(href: &str, title: &str, price: &str) -> String {
    format!(
        r#"<article class="product-card"><a href="{href}"><img src="/img{href}.jpg" alt=""><h3>{title}</h3></a><span class="price">{price}</span></article>"#
    )
}

fn site() -> FixtureSite {
    FixtureSite::new()
        .page(CATEGORY, &page(""))
        .page(
            "https://a.com/c/shoes?color=red",
            &page(&card("/p/1?ref=red", "Trail Runner", "€89,99")),
        )
        .page(
            "https://a.com/c/shoes?color=blue",
            &page(&format!(
                "{}{}",
                card("/p/1?utm_source=blue", "Trail Runner", "€89,99"),
                card("/p/2", "Road Racer", "$120.00")
            )),
        )
}

fn engine() -> FilterExplorationEngine {
    FilterExplorationEngine::new(
        ExplorationConfig {
            apply_settle_ms: 0,
            remove_settle_ms: 0,
            ..Default::default()
        },
        FilterDiscoveryEngine::new(
            FilterDiscoveryConfig {
                open_settle_ms: 0,
                ..Default::default()
            },
            FilterVocabulary::builtin(),
        ),
    )
}

#[tokio::test]
async fn test_product_seen_under_two_filters_is_reported_once() {
    let mut page = FixturePage::new(site());
    let result = engine()
        .explore_category(&mut page, CATEGORY, "Shoes", Deadline::none())
        .await
        .unwrap();

    // "In Stock" is an availability filter and never tried.
    let tried: Vec<&str> = result.filter_paths.iter().map(|p| p.filter.as_str()).collect();
    assert_eq!(tried, vec!["Red", "Blue"]);
    assert_eq!(result.discovery.excluded, 1);

    for path in &result.filter_paths {
        assert_eq!(path.state, FilterState::Captured);
        assert_eq!(path.activation, Some(Activation::UrlChange));
        assert_eq!(path.removal, Some(Removal::NavigatedBack));
    }
    assert_eq!(result.filter_paths[0].new_products, 1);
    assert_eq!(result.filter_paths[1].products_found, 2);
    assert_eq!(result.filter_paths[1].new_products, 1);

    assert_eq!(result.products.len(), 2);
    let runner = &result.products[0];
    assert_eq!(runner.canonical_url, "https://a.com/p/1");
    assert_eq!(runner.url, "https://a.com/p/1?ref=red");
    assert_eq!(runner.title, "Trail Runner");
    assert_eq!(runner.filters_applied_when_seen, vec!["Red", "Blue"]);
    let price = runner.price.as_ref().unwrap();
    assert!((price.amount - 89.99).abs() < 1e-9);
    assert_eq!(price.currency.as_deref(), Some("EUR"));

    let racer = &result.products[1];
    assert_eq!(racer.filters_applied_when_seen, vec!["Blue"]);
    assert_eq!(racer.price.as_ref().unwrap().currency.as_deref(), Some("USD"));

    assert_eq!(result.stats.canonical_collisions, 1);
    assert_eq!(result.stats.baseline_products, 0);
    assert!(!result.cancelled);
}

#[tokio::test]
async fn test_every_filter_starts_from_the_baseline() {
    let mut page = FixturePage::new(site());
    engine()
        .explore_category(&mut page, CATEGORY, "Shoes", Deadline::none())
        .await
        .unwrap();

    let visits = page.visits();
    assert_eq!(
        visits,
        vec![
            CATEGORY.to_string(),
            "https://a.com/c/shoes?color=red".to_string(),
            CATEGORY.to_string(),
            "https://a.com/c/shoes?color=blue".to_string(),
            CATEGORY.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_expired_deadline_keeps_baseline_products() {
    let site = FixtureSite::new().page(
        CATEGORY,
        &page(&card("/p/9", "Court Classic", "£60")),
    );
    let mut page = FixturePage::new(site);
    let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
    let result = engine()
        .explore_category(&mut page, CATEGORY, "Shoes", deadline)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert!(result.filter_paths.is_empty());
    assert_eq!(result.products.len(), 1);
    assert!(result.products[0].filters_applied_when_seen.is_empty());
    assert_eq!(result.stats.baseline_products, 1);
}
