//! Shared queue state for both reconciliation loops.
//!
//! One object owns every piece of cross-loop mutable state (the active
//! change queue, the inactive rotation, the seen-accounts registry, and the
//! stale-event watermark) behind a single mutex, so neither loop can observe
//! a torn view of any of them.
//!
//! The active queue is strict FIFO. The inactive queue is FIFO for seeding
//! and becomes a rotating ring once entries requeue after processing: its
//! steady-state depth equals the number of distinct tracked accounts.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use dw_types::{AccountCurrency, BalanceChange, BlockIdentifier, InactiveEntry};

use crate::watermark::StaleEventWatermark;

/// `true` when `entry` is due for a periodic resweep at `head_index`:
/// never checked, or checked at least `required_depth` confirmations ago.
pub fn eligible_for_resweep(entry: &InactiveEntry, head_index: i64, required_depth: i64) -> bool {
    match &entry.last_checked {
        None => true,
        Some(block) => block.index + required_depth < head_index,
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: VecDeque<BalanceChange>,
    inactive: VecDeque<InactiveEntry>,
    seen: HashSet<AccountCurrency>,
    watermark: StaleEventWatermark,
}

/// Jointly-owned queues, registry, and watermark.
pub(crate) struct QueueState {
    inner: Mutex<Inner>,
    active_ready: Notify,
}

impl QueueState {
    pub fn new() -> Self {
        Self::with_seen(&[])
    }

    /// Start with `accounts` already marked as scheduled, each holding a
    /// never-checked rotation slot. Duplicates collapse to one entry.
    pub fn with_seen(accounts: &[AccountCurrency]) -> Self {
        let mut inner = Inner::default();
        for account_currency in accounts {
            if inner.seen.insert(account_currency.clone()) {
                inner.inactive.push_back(InactiveEntry {
                    account_currency: account_currency.clone(),
                    last_checked: None,
                });
            }
        }
        Self {
            inner: Mutex::new(inner),
            active_ready: Notify::new(),
        }
    }

    /// Append a batch of balance changes and wake the active consumer.
    pub async fn push_changes(&self, changes: Vec<BalanceChange>) {
        let mut inner = self.inner.lock().await;
        inner.active.extend(changes);
        drop(inner);
        self.active_ready.notify_one();
    }

    /// Pop the oldest active change, suspending while the queue is empty.
    /// Returns `None` only on cancellation.
    pub async fn pop_active(&self, cancel: &CancellationToken) -> Option<BalanceChange> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(change) = inner.active.pop_front() {
                    return Some(change);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = self.active_ready.notified() => {}
            }
        }
    }

    /// Pop the front rotation entry when it is due at `head_index`.
    pub async fn pop_eligible_inactive(
        &self,
        head_index: i64,
        required_depth: i64,
    ) -> Option<InactiveEntry> {
        let mut inner = self.inner.lock().await;
        let front = inner.inactive.front()?;
        if eligible_for_resweep(front, head_index, required_depth) {
            inner.inactive.pop_front()
        } else {
            None
        }
    }

    /// First-time seeding from the active path: returns `true` and appends a
    /// rotation entry only if the identity was never scheduled before.
    pub async fn seed_if_unseen(
        &self,
        account_currency: AccountCurrency,
        checked_at: BlockIdentifier,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.seen.insert(account_currency.clone()) {
            return false;
        }
        inner.inactive.push_back(InactiveEntry {
            account_currency,
            last_checked: Some(checked_at),
        });
        true
    }

    /// Self-perpetuating rotation: unconditionally append the entry back.
    pub async fn requeue_inactive(
        &self,
        account_currency: AccountCurrency,
        checked_at: BlockIdentifier,
    ) {
        let mut inner = self.inner.lock().await;
        inner.inactive.push_back(InactiveEntry {
            account_currency,
            last_checked: Some(checked_at),
        });
    }

    pub async fn is_stale(&self, index: i64) -> bool {
        self.inner.lock().await.watermark.is_stale(index)
    }

    /// Raise the stale-event watermark; returns `true` if it moved.
    pub async fn raise_watermark(&self, index: i64) -> bool {
        self.inner.lock().await.watermark.raise_to(index)
    }

    pub async fn watermark_threshold(&self) -> i64 {
        self.inner.lock().await.watermark.threshold()
    }

    /// (active, inactive, seen) depths for status snapshots.
    pub async fn depths(&self) -> (usize, usize, usize) {
        let inner = self.inner.lock().await;
        (inner.active.len(), inner.inactive.len(), inner.seen.len())
    }
}
