// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the discovery engines.
//!
//! Engines almost never return these as `Err`: selector misses, interaction
//! timeouts and canonicalization failures degrade into partial results. The
//! variants exist so those partial results can carry a typed reason, and so
//! the few genuinely fatal paths (dead page session, bad config) have one.

use std::time::Duration;

/// Every failure mode the engines know how to name.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("selector not found: {selector}")]
    SelectorNotFound { selector: String },

    #[error("interaction timed out after {}ms: {action}", .after.as_millis())]
    InteractionTimeout { action: String, after: Duration },

    #[error("canonicalization failed for {url}: {reason}")]
    Canonicalization { url: String, reason: String },

    #[error("no pattern met the thresholds after {attempts} attempts")]
    PatternExhausted { attempts: usize },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("run cancelled: deadline expired")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Build a `SelectorNotFound` for `selector`.
    pub fn selector_not_found(selector: impl Into<String>) -> Self {
        Self::SelectorNotFound {
            selector: selector.into(),
        }
    }

    /// Build an `InteractionTimeout` for a named action.
    pub fn timeout(action: impl Into<String>, after: Duration) -> Self {
        Self::InteractionTimeout {
            action: action.into(),
            after,
        }
    }

    /// True for the failures a caller may reasonably retry with another strategy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InteractionTimeout { .. }
                | Self::Navigation { .. }
                | Self::PatternExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_includes_millis() {
        let err = EngineError::timeout("dropdown reveal", Duration::from_secs(10));
        assert_eq!(
            err.to_string(),
            "interaction timed out after 10000ms: dropdown reveal"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_selector_not_found_not_retryable() {
        let err = EngineError::selector_not_found("li.nav");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("li.nav"));
    }
}
