// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Navigation menu discovery: pattern catalog, single-pattern extractor and
//! the fallback driver.

pub mod catalog;
pub mod driver;
pub mod extractor;

pub use catalog::{InteractionType, NavigationPattern, PatternCatalog, PatternSelectors};
pub use driver::{NavigationOutcome, PatternAttempt, RedundantExtractionDriver};
pub use extractor::{
    DropdownLink, DropdownOutcome, DropdownResult, ExtractionResult, NavigationExtractor,
    NavigationItem, RevealMethod,
};
