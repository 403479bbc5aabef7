// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Category names, taxonomy qualifiers and crawl-mode deduplication.

pub mod dedup;
pub mod qualifiers;
pub mod slug;

pub use dedup::{CategoryDeduplicationResult, CategoryDeduplicator, CategorySample, CrawlMode};
pub use qualifiers::{Qualifiers, TaxonomyVocabulary};
pub use slug::slugify;
