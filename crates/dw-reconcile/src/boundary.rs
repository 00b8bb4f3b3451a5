//! Collaborator boundary for the reconciliation engine.
//!
//! This module defines **only** the contracts: what the engine needs from the
//! indexer-local data store, from the live network source, and from the
//! result sink. No concrete implementations, no transport, no persistence
//! logic belongs here.
//!
//! Implementations must be object-safe so callers can hold `Arc<dyn …>`
//! without knowing the concrete type, and `Send + Sync` so they can be used
//! across the two loop tasks.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dw_types::{
    AccountIdentifier, Amount, BlockIdentifier, Currency, NetworkIdentifier,
    PartialBlockIdentifier,
};

/// Which loop produced a reconciliation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconciliationKind {
    /// Triggered by an observed balance-change event.
    Active,
    /// Periodic resweep regardless of observed change.
    Inactive,
}

impl ReconciliationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationKind::Active => "ACTIVE",
            ReconciliationKind::Inactive => "INACTIVE",
        }
    }
}

/// The indexer's cached view of one account balance as of a head block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBalance {
    pub amount: Amount,
    /// Block at which the cached balance was last updated.
    pub last_updated: BlockIdentifier,
}

/// A live balance response from the node, with the block it was served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveBalance {
    pub block: BlockIdentifier,
    /// All currency balances the node reports for the account.
    pub balances: Vec<Amount>,
    pub observed_at_utc: DateTime<Utc>,
}

/// Indexer-local data access.
#[async_trait]
pub trait ChainHelper: Send + Sync {
    /// The most recent block the indexer considers canonical.
    /// Errors while nothing has been synced yet.
    async fn current_block(&self) -> Result<BlockIdentifier>;

    /// Whether `block` is still on the canonical chain as currently known.
    async fn block_exists(&self, block: &BlockIdentifier) -> Result<bool>;

    /// The cached balance for `account`/`currency` as of `head`, together
    /// with the block at which that balance was last updated.
    async fn account_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        head: &BlockIdentifier,
    ) -> Result<CachedBalance>;
}

/// Live network source. Implementations own their transient retry policy;
/// an error surfaced here is already past retries.
#[async_trait]
pub trait LiveBalanceFetcher: Send + Sync {
    /// Fetch the account's balances, at `block` when given, otherwise at the
    /// live head.
    async fn account_balance(
        &self,
        network: &NetworkIdentifier,
        account: &AccountIdentifier,
        block: Option<PartialBlockIdentifier>,
    ) -> Result<LiveBalance>;
}

/// Result sink. A returned error is fatal for the coordinator call that
/// invoked it.
#[async_trait]
pub trait ReconciliationHandler: Send + Sync {
    async fn reconciliation_succeeded(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        value: &str,
        block: &BlockIdentifier,
    ) -> Result<()>;

    async fn reconciliation_failed(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        cached_value: &str,
        live_value: &str,
        block: &BlockIdentifier,
    ) -> Result<()>;
}
