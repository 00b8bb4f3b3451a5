//! Stale-event watermark.
//!
//! # Purpose
//!
//! When the verifier falls too far behind the live head, re-checking every
//! backlogged event would never converge. The watermark records the block
//! index at which the engine gave up waiting; active events below it are
//! dropped as stale instead of being verified.
//!
//! # Invariants
//!
//! - **Starts disabled**: the initial threshold (−1) drops nothing.
//! - **Raised, never lowered**: `raise_to` ignores indices at or below the
//!   current threshold.
//! - **Strictly-below drops**: an event at exactly the threshold index is
//!   still verified.
//! - **Pure, no IO**: the caller provides indices and acts on the result.

/// Throttle threshold for active balance-change events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleEventWatermark {
    threshold: i64,
}

impl Default for StaleEventWatermark {
    fn default() -> Self {
        Self::new()
    }
}

impl StaleEventWatermark {
    /// Create a watermark in its initial, disabled state.
    pub fn new() -> Self {
        Self { threshold: -1 }
    }

    /// `true` once the watermark has been raised at least once.
    pub fn is_enabled(&self) -> bool {
        self.threshold >= 0
    }

    /// `true` when an event at `index` should be dropped without verifying.
    pub fn is_stale(&self, index: i64) -> bool {
        self.is_enabled() && index < self.threshold
    }

    /// Raise the threshold to `index`. Returns `true` if the threshold
    /// moved; attempts to lower it are ignored.
    pub fn raise_to(&mut self, index: i64) -> bool {
        if index > self.threshold {
            self.threshold = index;
            true
        } else {
            false
        }
    }

    /// Current threshold; −1 while disabled.
    pub fn threshold(&self) -> i64 {
        self.threshold
    }
}
