// Copyright 2026 Aisle Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation for extraction runs.
//!
//! A [`Deadline`] is only ever checked between DOM actions (between phases,
//! navigation items, filter candidates, crawl entries). A run that sees an
//! expired deadline stops where it is and returns what it has.

use std::time::{Duration, Instant};

/// Optional wall-clock limit for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self(None)
    }

    /// Expire `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    /// Expire at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Clamp an action timeout so it never outlives the run.
    pub fn clamp(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => timeout.min(left),
            None => timeout,
        }
    }
}
