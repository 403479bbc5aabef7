// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! URL canonicalization used as the deduplication key for products and for
//! the crawler's visited set.

use crate::error::EngineError;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

/// Query parameters that never change what a page shows.
const TRACKING_PARAMS: &[&str] = &[
    "ref", "ref_", "referrer", "gclid", "gbraid", "wbraid", "dclid", "fbclid", "msclkid",
    "yclid", "twclid", "igshid", "srsltid", "spm", "cid", "_ga", "_gl", "_ke", "mkt_tok",
    "trk", "trkid", "affiliate", "aff_id", "source", "sessionid", "sid",
];

/// Prefixes of tracking parameter families (`utm_source`, `mc_eid`, ...).
const TRACKING_PREFIXES: &[&str] = &["utm_", "mc_", "_hs", "pk_", "hsa_", "oly_"];

/// Turns a raw URL into its deduplication key.
///
/// Implementations must be pure and idempotent. Callers treat an `Err` as
/// "canonicalization unavailable" and fall back to the raw URL.
pub trait Canonicalizer: Send + Sync {
    fn canonicalize(&self, url: &str) -> Result<String, EngineError>;
}

/// Default canonicalizer: strips fragments and tracking parameters, sorts the
/// remaining query, trims trailing slashes on non-root paths. Scheme-less
/// inputs (`shop.com/p/1`) are read as https.
#[derive(Debug, Clone, Default)]
pub struct TrackingParamCanonicalizer;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("scheme regex is valid"))
}

fn non_web_scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(javascript|mailto|tel|sms|data|blob|about|file|ftp):")
            .expect("non-web scheme regex is valid")
    })
}

/// True for parameters the default canonicalizer drops.
pub fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str())
        || TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

impl Canonicalizer for TrackingParamCanonicalizer {
    fn canonicalize(&self, raw: &str) -> Result<String, EngineError> {
        let fail = |reason: &str| EngineError::Canonicalization {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(fail("empty url"));
        }
        if non_web_scheme_re().is_match(trimmed) {
            return Err(fail("unsupported scheme"));
        }
        let candidate = if scheme_re().is_match(trimmed) {
            trimmed.to_string()
        } else if let Some(rest) = trimmed.strip_prefix("//") {
            format!("https://{rest}")
        } else {
            format!("https://{trimmed}")
        };

        let mut url = Url::parse(&candidate).map_err(|e| fail(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(fail("unsupported scheme"));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(fail("missing host"));
        }

        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        pairs.dedup();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        let path = url.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }

        Ok(url.to_string())
    }
}

/// Canonical key for `url`, or the raw URL when canonicalization fails.
/// The boolean is `true` when the fallback was used.
pub fn key_or_raw(canonicalizer: &dyn Canonicalizer, url: &str) -> (String, bool) {
    match canonicalizer.canonicalize(url) {
        Ok(key) => (key, false),
        Err(e) => {
            warn!(url, error = %e, "canonicalization unavailable, keying by raw url");
            (url.trim().to_string(), true)
        }
    }
}
