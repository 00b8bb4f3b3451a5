//! dw-reconcile
//!
//! Reconciliation engine for a ledger-indexing service: continuously verifies
//! that balances computed and cached by the indexer match the balances the
//! live chain node reports, surfacing drift from indexing bugs, races, and
//! chain reorganizations.
//!
//! Architectural decisions:
//! - Two perpetual loops: active (event-driven) and inactive (periodic
//!   resweep on a confirmation-depth cadence), sharing one queue state.
//! - Every comparison outcome is classified deterministically: matched,
//!   mismatched, skipped (with reason), or fault. Callbacks fire only for
//!   matched and mismatched.
//! - Stale active events are throttled by a monotonic block watermark.
//! - All balance arithmetic is exact decimal; never floating point.
//! - External collaborators (indexer data, live node, result sink) sit
//!   behind object-safe async traits. No transport code in this crate.

mod active;
mod boundary;
mod compare;
mod config;
mod coordinator;
mod inactive;
mod reconciler;
mod retrieval;
mod state;
mod watermark;

pub use boundary::{
    CachedBalance, ChainHelper, LiveBalance, LiveBalanceFetcher, ReconciliationHandler,
    ReconciliationKind,
};
pub use compare::{compare_balance, CompareResult, Comparison};
pub use config::{load_watch_list, ReconcilerConfig};
pub use coordinator::{ReconcileOutcome, SkipReason};
pub use reconciler::{Reconciler, StatsSnapshot};
pub use retrieval::MissingCurrencyError;
pub use state::eligible_for_resweep;
pub use watermark::StaleEventWatermark;
