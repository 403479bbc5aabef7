// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crawl-mode decisions over a realistic set of overlapping categories.

use aisle_runtime::canonical::TrackingParamCanonicalizer;
use aisle_runtime::config::DedupConfig;
use aisle_runtime::taxonomy::{
    CategoryDeduplicationResult, CategoryDeduplicator, CategorySample, CrawlMode,
    TaxonomyVocabulary,
};

fn urls(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
    range
        .map(|i| format!("https://shop.test/p/{prefix}-{i}?utm_source=nav"))
        .collect()
}

fn sample(name: &str, products: Vec<String>) -> CategorySample {
    CategorySample::from_products(
        name,
        None,
        products.iter().map(String::as_str),
        &TrackingParamCanonicalizer,
    )
}

fn storefront() -> Vec<CategorySample> {
    let dresses = urls("dress", 0..40);
    let tops = urls("top", 0..60);
    let jeans = urls("jean", 0..30);
    let women: Vec<String> = dresses.iter().chain(&tops).chain(&jeans).cloned().collect();

    vec![
        sample("Women", women),
        sample("Women's Dresses", dresses.clone()),
        sample("Dresses", dresses),
        sample("Women's Tops", tops),
        sample("Women's Jeans", jeans),
        sample("Sale", urls("sale", 0..25)),
        sample("Gift Cards", Vec::new()),
        sample("womens tops", Vec::new()),
    ]
}

fn by_name<'a>(
    results: &'a [CategoryDeduplicationResult],
    name: &str,
) -> &'a CategoryDeduplicationResult {
    results.iter().find(|r| r.name == name).unwrap()
}

#[test]
fn test_storefront_crawl_modes() {
    let input = storefront();
    let results = CategoryDeduplicator::default().deduplicate(&input);
    assert_eq!(results.len(), input.len());

    let women = by_name(&results, "Women");
    assert_eq!(women.crawl_mode, CrawlMode::StructuralOnly);
    assert_eq!(
        women.children,
        vec!["Women's Dresses", "Women's Tops", "Women's Jeans"]
    );

    let dresses = by_name(&results, "Dresses");
    assert_eq!(dresses.crawl_mode, CrawlMode::Alias);
    assert_eq!(dresses.alias_of.as_deref(), Some("Women's Dresses"));
    assert_eq!(dresses.reason, "100% product overlap");

    for name in ["Women's Dresses", "Women's Tops", "Women's Jeans", "Sale"] {
        assert_eq!(by_name(&results, name).crawl_mode, CrawlMode::Products, "{name}");
    }
    assert_eq!(by_name(&results, "Gift Cards").reason, "no product sample");

    let dup = by_name(&results, "womens tops");
    assert_eq!(dup.crawl_mode, CrawlMode::Alias);
    assert_eq!(dup.reason, "duplicate slug");
    assert_eq!(dup.alias_of.as_deref(), Some("Women's Tops"));
}

#[test]
fn test_decisions_are_consistent() {
    let input = storefront();
    let results = CategoryDeduplicator::default().deduplicate(&input);

    for (r, c) in results.iter().zip(&input) {
        assert_eq!(r.name, c.name, "output order follows input");
        match r.crawl_mode {
            CrawlMode::Alias => {
                let target = by_name(&results, r.alias_of.as_deref().unwrap());
                assert_ne!(target.crawl_mode, CrawlMode::Alias, "{} aliases an alias", r.name);
            }
            CrawlMode::StructuralOnly => assert!(r.children.len() >= 2),
            CrawlMode::Products => assert!(r.alias_of.is_none() && r.children.is_empty()),
        }
    }
}

#[test]
fn test_thresholds_come_from_config() {
    // At 0.5 superset coverage a category covering half of two others is
    // already an umbrella.
    let a = urls("a", 0..10);
    let b = urls("b", 0..10);
    let mut umbrella: Vec<String> = a[..5].to_vec();
    umbrella.extend_from_slice(&b[..6]);
    umbrella.extend(urls("u", 0..20));
    let input = vec![
        sample("Everything", umbrella),
        sample("Bags", a),
        sample("Belts", b),
    ];

    let strict = CategoryDeduplicator::default().deduplicate(&input);
    assert_eq!(strict[0].crawl_mode, CrawlMode::Products);

    let loose = CategoryDeduplicator::new(
        DedupConfig {
            superset_threshold: 0.5,
            ..Default::default()
        },
        TaxonomyVocabulary::builtin(),
    )
    .deduplicate(&input);
    assert_eq!(loose[0].crawl_mode, CrawlMode::StructuralOnly);
    assert_eq!(loose[0].reason, "covers 2 sibling categories");
}

#[test]
fn test_large_umbrella_is_structural_beyond_sample_size() {
    let men = urls("men", 0..500);
    let women = urls("women", 0..500);
    let all: Vec<String> = men.iter().chain(&women).cloned().collect();
    let input = vec![
        sample("All Clothing", all),
        sample("Men's Clothing", men),
        sample("Women's Clothing", women),
    ];

    let config = DedupConfig::default();
    assert!(input[0].products.len() > config.sample_size);
    let results =
        CategoryDeduplicator::new(config, TaxonomyVocabulary::builtin()).deduplicate(&input);

    let umbrella = &results[0];
    assert_eq!(umbrella.crawl_mode, CrawlMode::StructuralOnly, "{}", umbrella.reason);
    assert_eq!(umbrella.children, vec!["Men's Clothing", "Women's Clothing"]);
    let overlap = umbrella.max_overlap.unwrap();
    assert!((0.35..=0.65).contains(&overlap), "overlap {overlap}");
    assert_eq!(results[1].crawl_mode, CrawlMode::Products);
    assert_eq!(results[2].crawl_mode, CrawlMode::Products);
}
