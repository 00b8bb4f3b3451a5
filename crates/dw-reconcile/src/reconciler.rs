//! Engine façade: collaborator wiring, the external enqueue entry point,
//! loop lifecycle, and status counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use dw_types::{BalanceChange, BlockIdentifier, NetworkIdentifier};

use crate::boundary::{ChainHelper, LiveBalanceFetcher, ReconciliationHandler};
use crate::config::ReconcilerConfig;
use crate::state::QueueState;

/// Monotonic engine counters. Written with relaxed atomics; read only for
/// status snapshots.
#[derive(Default)]
pub(crate) struct Counters {
    active_checked: AtomicU64,
    inactive_checked: AtomicU64,
    matched: AtomicU64,
    mismatched: AtomicU64,
    skipped: AtomicU64,
    faults: AtomicU64,
    stale_dropped: AtomicU64,
}

impl Counters {
    pub fn inc_active_checked(&self) {
        self.active_checked.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_inactive_checked(&self) {
        self.inactive_checked.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_matched(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_mismatched(&self) {
        self.mismatched.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_faults(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_stale_dropped(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of engine activity and queue depths.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub captured_at_utc: DateTime<Utc>,
    pub active_checked: u64,
    pub inactive_checked: u64,
    pub matched: u64,
    pub mismatched: u64,
    pub skipped: u64,
    pub faults: u64,
    pub stale_dropped: u64,
    pub active_queue: usize,
    pub inactive_queue: usize,
    pub seen_accounts: usize,
    /// −1 while the stale-event watermark is disabled.
    pub watermark_threshold: i64,
}

/// The reconciliation engine. Collaborators are object-safe trait handles;
/// all cross-loop state lives in one mutex-guarded [`QueueState`].
pub struct Reconciler {
    pub(crate) network: NetworkIdentifier,
    pub(crate) helper: Arc<dyn ChainHelper>,
    pub(crate) fetcher: Arc<dyn LiveBalanceFetcher>,
    pub(crate) handler: Arc<dyn ReconciliationHandler>,
    pub(crate) config: ReconcilerConfig,
    pub(crate) state: QueueState,
    pub(crate) stats: Counters,
}

impl Reconciler {
    pub fn new(
        network: NetworkIdentifier,
        helper: Arc<dyn ChainHelper>,
        fetcher: Arc<dyn LiveBalanceFetcher>,
        handler: Arc<dyn ReconciliationHandler>,
        config: ReconcilerConfig,
    ) -> Self {
        let state = QueueState::with_seen(&config.seen_accounts);
        Self {
            network,
            helper,
            fetcher,
            handler,
            config,
            state,
            stats: Counters::default(),
        }
    }

    /// Entry point for the indexer: enqueue the balance changes it observed
    /// at `block`, plus one forced zero-difference check per watch-list
    /// account.
    pub async fn queue_changes(&self, block: &BlockIdentifier, mut changes: Vec<BalanceChange>) {
        for watched in &self.config.interesting_accounts {
            changes.push(BalanceChange {
                account: watched.account.clone(),
                currency: watched.currency.clone(),
                block: block.clone(),
                difference: "0".to_string(),
            });
        }
        if changes.is_empty() {
            return;
        }
        debug!(
            block_index = block.index,
            count = changes.len(),
            "queueing balance changes"
        );
        self.state.push_changes(changes).await;
    }

    /// Drive both loops until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tokio::try_join!(
            self.run_active(cancel.clone()),
            self.run_inactive(cancel.clone())
        )?;
        Ok(())
    }

    /// Spawn both loops as background tasks and hand back their handles.
    pub fn spawn(self: &Arc<Self>, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        let engine = Arc::clone(self);
        let token = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = engine.run_active(token).await {
                error!("active reconciliation loop terminated: {err:#}");
            }
        }));

        let engine = Arc::clone(self);
        let token = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = engine.run_inactive(token).await {
                error!("inactive reconciliation loop terminated: {err:#}");
            }
        }));

        handles
    }

    pub async fn stats(&self) -> StatsSnapshot {
        let (active_queue, inactive_queue, seen_accounts) = self.state.depths().await;
        StatsSnapshot {
            captured_at_utc: Utc::now(),
            active_checked: self.stats.active_checked.load(Ordering::Relaxed),
            inactive_checked: self.stats.inactive_checked.load(Ordering::Relaxed),
            matched: self.stats.matched.load(Ordering::Relaxed),
            mismatched: self.stats.mismatched.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            faults: self.stats.faults.load(Ordering::Relaxed),
            stale_dropped: self.stats.stale_dropped.load(Ordering::Relaxed),
            active_queue,
            inactive_queue,
            seen_accounts,
            watermark_threshold: self.state.watermark_threshold().await,
        }
    }
}
