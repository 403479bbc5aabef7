// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Discovered products and their canonical-URL accumulator.

use crate::canonical::Canonicalizer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// A parsed listing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: Option<String>,
    pub raw: String,
}

/// A product seen on a listing page, keyed by `canonical_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredProduct {
    /// First raw URL the product was seen under.
    pub url: String,
    pub canonical_url: String,
    pub title: String,
    pub price: Option<Price>,
    pub image: Option<String>,
    /// Filter labels active when the product was seen, in first-seen order.
    pub filters_applied_when_seen: Vec<String>,
}

/// One product sighting on the current page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSighting {
    pub url: String,
    pub title: String,
    pub price: Option<Price>,
    pub image: Option<String>,
}

/// Counters kept by [`ProductAccumulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorStats {
    pub sightings: usize,
    pub merged: usize,
    /// Distinct raw URLs that collapsed onto an existing canonical key.
    pub canonical_collisions: usize,
    /// Sightings keyed by raw URL because canonicalization failed.
    pub canonical_fallbacks: usize,
}

/// Run-scoped product map. Never emits two products with one canonical URL.
#[derive(Default)]
pub struct ProductAccumulator {
    index: HashMap<String, usize>,
    products: Vec<DiscoveredProduct>,
    raw_urls: HashMap<String, HashSet<String>>,
    stats: AccumulatorStats,
}

impl ProductAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting. Returns `true` when the product is new.
    pub fn record(
        &mut self,
        canonicalizer: &dyn Canonicalizer,
        sighting: ProductSighting,
        filter: Option<&str>,
    ) -> bool {
        self.stats.sightings += 1;
        let key = match canonicalizer.canonicalize(&sighting.url) {
            Ok(key) => key,
            Err(e) => {
                debug!(url = %sighting.url, error = %e, "keying product by raw url");
                self.stats.canonical_fallbacks += 1;
                sighting.url.trim().to_string()
            }
        };

        let raws = self.raw_urls.entry(key.clone()).or_default();
        let new_raw = raws.insert(sighting.url.clone());

        match self.index.get(&key) {
            Some(&i) => {
                if new_raw {
                    self.stats.canonical_collisions += 1;
                }
                self.stats.merged += 1;
                let product = &mut self.products[i];
                if let Some(f) = filter {
                    if !product.filters_applied_when_seen.iter().any(|s| s == f) {
                        product.filters_applied_when_seen.push(f.to_string());
                    }
                }
                if sighting.title.len() > product.title.len() {
                    product.title = sighting.title;
                }
                if product.price.is_none() {
                    product.price = sighting.price;
                }
                if product.image.is_none() {
                    product.image = sighting.image;
                }
                false
            }
            None => {
                self.index.insert(key.clone(), self.products.len());
                self.products.push(DiscoveredProduct {
                    url: sighting.url,
                    canonical_url: key,
                    title: sighting.title,
                    price: sighting.price,
                    image: sighting.image,
                    filters_applied_when_seen: filter
                        .map(|f| vec![f.to_string()])
                        .unwrap_or_default(),
                });
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    pub fn into_products(self) -> Vec<DiscoveredProduct> {
        self.products
    }
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d.,]*").expect("price regex is valid"))
}

fn currency_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(USD|EUR|GBP|JPY|CAD|AUD|CHF|SEK|NOK|DKK|PLN|INR|CNY|KRW|BRL|MXN)\b")
            .expect("currency code regex is valid")
    })
}

/// Parse the first price in a listing's price text. Handles `1,234.56`,
/// `1.234,56` and `29,99`; a zero amount is no price.
pub fn parse_price(text: &str) -> Option<Price> {
    let token = price_re().find(text)?.as_str().trim_end_matches(['.', ',']);

    let normalized = if token.contains(',') && token.contains('.') {
        if token.rfind(',') > token.rfind('.') {
            token.replace('.', "").replace(',', ".")
        } else {
            token.replace(',', "")
        }
    } else if let Some(after) = token.rsplit(',').next().filter(|_| token.contains(',')) {
        if after.len() <= 2 {
            token.replace(',', ".")
        } else {
            token.replace(',', "")
        }
    } else if token.matches('.').count() > 1 {
        token.replace('.', "")
    } else {
        token.to_string()
    };

    let amount = normalized.parse::<f64>().ok().filter(|v| *v > 0.0 && v.is_finite())?;
    Some(Price {
        amount,
        currency: detect_currency(text),
        raw: text.trim().to_string(),
    })
}

fn detect_currency(text: &str) -> Option<String> {
    for ch in text.chars() {
        let code = match ch {
            '$' => "USD",
            '\u{20AC}' => "EUR",
            '\u{00A3}' => "GBP",
            '\u{00A5}' => "JPY",
            '\u{20B9}' => "INR",
            '\u{20A9}' => "KRW",
            _ => continue,
        };
        return Some(code.to_string());
    }
    currency_code_re()
        .find(&text.to_ascii_uppercase())
        .map(|m| m.as_str().to_string())
}

/// The longest candidate within `[min, max]` characters that is not just a
/// price. Falls back to the first non-empty candidate.
pub fn best_title<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    min: usize,
    max: usize,
) -> Option<String> {
    let cleaned: Vec<&str> = candidates
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    cleaned
        .iter()
        .filter(|t| {
            let n = t.chars().count();
            n >= min && n <= max && !looks_like_price(t)
        })
        .max_by_key(|t| t.chars().count())
        .or_else(|| cleaned.first())
        .map(|t| t.to_string())
}

fn looks_like_price(text: &str) -> bool {
    let without_codes = currency_code_re().replace_all(&text.to_ascii_uppercase(), "").into_owned();
    without_codes.chars().any(|c| c.is_ascii_digit())
        && without_codes
            .chars()
            .all(|c| c.is_ascii_digit() || !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::TrackingParamCanonicalizer;

    fn sighting(url: &str) -> ProductSighting {
        ProductSighting {
            url: url.into(),
            title: "Trail Runner".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_product_under_two_filters() {
        let mut acc = ProductAccumulator::new();
        let canon = TrackingParamCanonicalizer;
        assert!(acc.record(&canon, sighting("a.com/p/1?ref=x"), Some("Red")));
        assert!(!acc.record(&canon, sighting("a.com/p/1"), Some("Blue")));
        assert!(!acc.record(&canon, sighting("a.com/p/1"), Some("Blue")));

        assert_eq!(acc.stats().canonical_collisions, 1);
        let products = acc.into_products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].filters_applied_when_seen, vec!["Red", "Blue"]);
        assert_eq!(products[0].canonical_url, "https://a.com/p/1");
    }

    #[test]
    fn test_canonicalization_failure_keys_by_raw_url() {
        let mut acc = ProductAccumulator::new();
        assert!(acc.record(&TrackingParamCanonicalizer, sighting("javascript:void(0)"), None));
        assert_eq!(acc.stats().canonical_fallbacks, 1);
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn test_parse_price_formats() {
        let p = parse_price("$1,234.56").unwrap();
        assert_eq!(p.amount, 1234.56);
        assert_eq!(p.currency.as_deref(), Some("USD"));
        assert_eq!(parse_price("29,99 €").unwrap().amount, 29.99);
        assert_eq!(parse_price("1.234,50 EUR").unwrap().currency.as_deref(), Some("EUR"));
        assert_eq!(parse_price("£45").unwrap().currency.as_deref(), Some("GBP"));
        assert_eq!(parse_price("Free"), None);
        assert_eq!(parse_price("$0.00"), None);
    }

    #[test]
    fn test_best_title_prefers_longest_reasonable() {
        let long = "x".repeat(300);
        let title = best_title(
            ["Shop", "Trail Runner GTX Women's", "$120.00", long.as_str(), "ok"],
            3,
            200,
        );
        assert_eq!(title.as_deref(), Some("Trail Runner GTX Women's"));
        assert_eq!(best_title(["ab"], 3, 200).as_deref(), Some("ab"));
        assert_eq!(best_title(Vec::<&str>::new(), 3, 200), None);
    }
}
