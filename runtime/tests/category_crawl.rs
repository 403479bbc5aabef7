// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Subcategory crawling over a fixture site with cross-links and cycles.

use aisle_runtime::budget::Deadline;
use aisle_runtime::config::CrawlConfig;
use aisle_runtime::crawl::{SeedEntry, SubCategoryExplorer};
use aisle_runtime::renderer::fixture::{FixturePage, FixtureSite};
use std::collections::HashSet;

fn sidebar(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, text)| format!(r#"<li><a href="{href}">{text}</a></li>"#))
        .collect();
    format!(r#"<aside class="sidebar"><ul>{items}</ul></aside>"#)
}

fn listing(n: usize) -> String {
    (0..n)
        .map(|i| format!(r#"<div class="product-card"><a href="/product/{i}">Item {i}</a></div>"#))
        .collect()
}

fn site() -> FixtureSite {
    let page = |body: String| format!("<html><body>{body}</body></html>");
    FixtureSite::new()
        .page(
            "https://shop.test/c/women",
            &page(sidebar(&[
                ("/c/women/dresses", "Dresses"),
                ("/c/women/tops", "Tops"),
                ("/c/men", "Men"),
            ])),
        )
        .page(
            "https://shop.test/c/women/dresses",
            &page(format!(
                "{}{}",
                sidebar(&[("/c/women/dresses/maxi", "Maxi"), ("/c/women", "Back to Women")]),
                listing(2)
            )),
        )
        .page("https://shop.test/c/women/dresses/maxi", &page(listing(5)))
        .page("https://shop.test/c/women/tops", &page(listing(4)))
        .page(
            "https://shop.test/c/men",
            &page(sidebar(&[("/c/women", "Women"), ("/c/men/shirts", "Shirts")])),
        )
        .page("https://shop.test/c/men/shirts", &page(listing(3)))
}

fn explorer(max_depth: u32) -> SubCategoryExplorer {
    SubCategoryExplorer::new(CrawlConfig {
        max_depth,
        settle_ms: 0,
        ..Default::default()
    })
}

fn seeds() -> Vec<SeedEntry> {
    vec![
        SeedEntry::root("https://shop.test/c/women", "Women"),
        SeedEntry::root("https://shop.test/c/men", "Men"),
    ]
}

#[tokio::test]
async fn test_every_url_is_visited_once() {
    let mut page = FixturePage::new(site());
    let hierarchy = explorer(3).explore_all(&mut page, &seeds(), Deadline::none()).await;

    let visits = page.visits();
    let unique: HashSet<&String> = visits.iter().collect();
    assert_eq!(visits.len(), unique.len(), "revisited: {visits:?}");
    assert_eq!(visits.len(), 6);

    assert_eq!(hierarchy.len(), 6);
    assert_eq!(hierarchy.stats.visited, 6);
    assert!(hierarchy.failures.is_empty());

    // The Women sidebar links Men, but Men is a seed of its own.
    let men = hierarchy.get("https://shop.test/c/men").unwrap();
    assert_eq!(men.depth, 0);
    assert_eq!(men.parent_url, None);
    assert_eq!(men.navigation_path, vec!["Men"]);
    let shirts = hierarchy.get("https://shop.test/c/men/shirts").unwrap();
    assert_eq!(shirts.parent_url.as_deref(), Some("https://shop.test/c/men"));
    assert_eq!(shirts.depth, 1);
}

#[tokio::test]
async fn test_leaves_and_branches() {
    let mut page = FixturePage::new(site());
    let hierarchy = explorer(3).explore_all(&mut page, &seeds(), Deadline::none()).await;

    let maxi = hierarchy.get("https://shop.test/c/women/dresses/maxi").unwrap();
    assert!(maxi.is_leaf);
    assert_eq!(maxi.depth, 2);
    assert_eq!(maxi.navigation_path, vec!["Women", "Dresses", "Maxi"]);

    // Two product cards are below the product-signal threshold, and the
    // page links onwards anyway.
    let dresses = hierarchy.get("https://shop.test/c/women/dresses").unwrap();
    assert!(!dresses.is_leaf);
    assert!(!dresses.has_products);
    assert_eq!(dresses.link_source.as_deref(), Some("sidebar"));

    let leaves: Vec<&str> = hierarchy.leaves().map(|e| e.name.as_str()).collect();
    assert_eq!(leaves, vec!["Maxi", "Tops", "Shirts"]);
    assert_eq!(hierarchy.stats.leaf_count, 3);

    let children: Vec<&str> = hierarchy
        .children_of("https://shop.test/c/women")
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(children, vec!["Dresses", "Tops"]);
    let women = hierarchy.get("https://shop.test/c/women").unwrap();
    assert_eq!(women.subcategory_count, 2);
}

#[tokio::test]
async fn test_depth_limit_stops_descent() {
    let mut page = FixturePage::new(site());
    let hierarchy = explorer(2).explore_all(&mut page, &seeds(), Deadline::none()).await;

    assert!(hierarchy.entries.iter().all(|e| e.depth < 2));
    assert!(hierarchy.get("https://shop.test/c/women/dresses/maxi").is_none());
    assert!(hierarchy.get("https://shop.test/c/men/shirts").is_some());
    assert_eq!(hierarchy.stats.skipped_depth, 1);
    assert!(!page.visits().contains(&"https://shop.test/c/women/dresses/maxi".to_string()));
}

#[tokio::test]
async fn test_missing_page_is_isolated() {
    let site = site().page(
        "https://shop.test/c/sale",
        &format!(
            "<html><body>{}</body></html>",
            sidebar(&[("/c/sale/gone", "Gone"), ("/c/sale/shoes", "Sale Shoes")])
        ),
    )
    .page("https://shop.test/c/sale/shoes", &format!("<html><body>{}</body></html>", listing(3)));
    let mut page = FixturePage::new(site);
    let hierarchy = explorer(3)
        .explore_all(
            &mut page,
            &[SeedEntry::root("https://shop.test/c/sale", "Sale")],
            Deadline::none(),
        )
        .await;

    assert_eq!(hierarchy.failures.len(), 1);
    assert_eq!(hierarchy.failures[0].url, "https://shop.test/c/sale/gone");
    assert_eq!(hierarchy.failures[0].depth, 1);
    assert!(hierarchy.get("https://shop.test/c/sale/shoes").unwrap().is_leaf);
}

#[tokio::test]
async fn test_shared_sidebar_keeps_siblings_as_siblings() {
    let nav = sidebar(&[("/c/women/tops", "Tops"), ("/c/women/dresses", "Dresses")]);
    let page = |extra: String| format!("<html><body>{nav}{extra}</body></html>");
    let site = FixtureSite::new()
        .page("https://shop.test/c/women", &page(String::new()))
        .page("https://shop.test/c/women/tops", &page(listing(5)))
        .page("https://shop.test/c/women/dresses", &page(listing(5)));
    let mut browser = FixturePage::new(site);
    let hierarchy = explorer(3)
        .explore_all(
            &mut browser,
            &[SeedEntry::root("https://shop.test/c/women", "Women")],
            Deadline::none(),
        )
        .await;

    assert_eq!(hierarchy.len(), 3);
    for (url, name) in [
        ("https://shop.test/c/women/tops", "Tops"),
        ("https://shop.test/c/women/dresses", "Dresses"),
    ] {
        let entry = hierarchy.get(url).unwrap();
        assert_eq!(entry.depth, 1, "{name}");
        assert_eq!(entry.parent_url.as_deref(), Some("https://shop.test/c/women"));
        assert_eq!(entry.navigation_path, vec!["Women", name]);
        assert_eq!(entry.subcategory_count, 0);
        assert!(entry.is_leaf, "{name} should be a leaf");
    }
    assert_eq!(hierarchy.stats.leaf_count, 2);
}
