//! In-process fakes for the reconciliation engine's collaborator
//! boundaries: a scriptable chain view, a scriptable live balance source,
//! and a recording result sink. No network, no DB; scenario tests drive
//! the real loops against these.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use dw_reconcile::{
    CachedBalance, ChainHelper, LiveBalance, LiveBalanceFetcher, ReconciliationHandler,
    ReconciliationKind,
};
use dw_types::{
    AccountCurrency, AccountIdentifier, Amount, BlockIdentifier, Currency, NetworkIdentifier,
    PartialBlockIdentifier,
};

/// Install a fmt subscriber for test output. Safe to call from every test;
/// only the first call wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// MockChain — scriptable indexer-local view
// ---------------------------------------------------------------------------

/// Scriptable [`ChainHelper`]: a movable head, a canonical-block set, and
/// per-account cached balances.
#[derive(Default)]
pub struct MockChain {
    head: RwLock<Option<BlockIdentifier>>,
    canonical: RwLock<HashSet<(i64, String)>>,
    balances: RwLock<HashMap<AccountCurrency, CachedBalance>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the head. The new head is also recorded as canonical.
    pub async fn set_head(&self, block: BlockIdentifier) {
        self.add_block(block.clone()).await;
        *self.head.write().await = Some(block);
    }

    pub async fn add_block(&self, block: BlockIdentifier) {
        self.canonical
            .write()
            .await
            .insert((block.index, block.hash));
    }

    /// Simulate a reorg: the block stops being canonical.
    pub async fn orphan_block(&self, block: &BlockIdentifier) {
        self.canonical
            .write()
            .await
            .remove(&(block.index, block.hash.clone()));
    }

    pub async fn set_balance(
        &self,
        account_currency: AccountCurrency,
        amount: Amount,
        last_updated: BlockIdentifier,
    ) {
        self.balances.write().await.insert(
            account_currency,
            CachedBalance {
                amount,
                last_updated,
            },
        );
    }
}

#[async_trait]
impl ChainHelper for MockChain {
    async fn current_block(&self) -> Result<BlockIdentifier> {
        self.head
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("no blocks synced yet"))
    }

    async fn block_exists(&self, block: &BlockIdentifier) -> Result<bool> {
        Ok(self
            .canonical
            .read()
            .await
            .contains(&(block.index, block.hash.clone())))
    }

    async fn account_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        _head: &BlockIdentifier,
    ) -> Result<CachedBalance> {
        let key = AccountCurrency::of(account, currency);
        match self.balances.read().await.get(&key) {
            Some(cached) => Ok(cached.clone()),
            None => bail!(
                "no cached balance for {}:{}",
                account.address,
                currency.symbol
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// MockLiveSource — scriptable node responses
// ---------------------------------------------------------------------------

/// Scriptable [`LiveBalanceFetcher`]. Records every request's block
/// reference so tests can assert point-in-time vs. live-head lookups.
#[derive(Default)]
pub struct MockLiveSource {
    live: RwLock<Vec<(AccountIdentifier, BlockIdentifier, Vec<Amount>)>>,
    requests: Mutex<Vec<Option<PartialBlockIdentifier>>>,
}

impl MockLiveSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the node's answer for one account: the block the response is
    /// served at and the full balance list. Re-scripting an account
    /// replaces its previous answer.
    pub async fn set_live(
        &self,
        account: AccountIdentifier,
        block: BlockIdentifier,
        balances: Vec<Amount>,
    ) {
        let mut live = self.live.write().await;
        if let Some(slot) = live.iter_mut().find(|(scripted, _, _)| *scripted == account) {
            slot.1 = block;
            slot.2 = balances;
        } else {
            live.push((account, block, balances));
        }
    }

    pub async fn requests(&self) -> Vec<Option<PartialBlockIdentifier>> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LiveBalanceFetcher for MockLiveSource {
    async fn account_balance(
        &self,
        _network: &NetworkIdentifier,
        account: &AccountIdentifier,
        block: Option<PartialBlockIdentifier>,
    ) -> Result<LiveBalance> {
        self.requests.lock().await.push(block);

        for (scripted, live_block, balances) in self.live.read().await.iter() {
            if scripted == account {
                return Ok(LiveBalance {
                    block: live_block.clone(),
                    balances: balances.clone(),
                    observed_at_utc: Utc::now(),
                });
            }
        }
        bail!("no live balance scripted for {}", account.address)
    }
}

// ---------------------------------------------------------------------------
// RecordingHandler — result sink with assertable history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SuccessRecord {
    pub kind: ReconciliationKind,
    pub account: AccountIdentifier,
    pub currency: Currency,
    pub value: String,
    pub block: BlockIdentifier,
}

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub kind: ReconciliationKind,
    pub account: AccountIdentifier,
    pub currency: Currency,
    pub cached_value: String,
    pub live_value: String,
    pub block: BlockIdentifier,
}

/// [`ReconciliationHandler`] that records every callback. Can be armed to
/// reject callbacks, for fault-path tests.
#[derive(Default)]
pub struct RecordingHandler {
    succeeded: Mutex<Vec<SuccessRecord>>,
    failed: Mutex<Vec<FailureRecord>>,
    reject: RwLock<Option<String>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent callback return an error with this message.
    pub async fn reject_with(&self, message: impl Into<String>) {
        *self.reject.write().await = Some(message.into());
    }

    /// Let callbacks succeed again.
    pub async fn clear_rejection(&self) {
        *self.reject.write().await = None;
    }

    pub async fn successes(&self) -> Vec<SuccessRecord> {
        self.succeeded.lock().await.clone()
    }

    pub async fn failures(&self) -> Vec<FailureRecord> {
        self.failed.lock().await.clone()
    }

    async fn rejection(&self) -> Option<String> {
        self.reject.read().await.clone()
    }
}

#[async_trait]
impl ReconciliationHandler for RecordingHandler {
    async fn reconciliation_succeeded(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        value: &str,
        block: &BlockIdentifier,
    ) -> Result<()> {
        if let Some(message) = self.rejection().await {
            bail!("{message}");
        }
        self.succeeded.lock().await.push(SuccessRecord {
            kind,
            account: account.clone(),
            currency: currency.clone(),
            value: value.to_string(),
            block: block.clone(),
        });
        Ok(())
    }

    async fn reconciliation_failed(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        cached_value: &str,
        live_value: &str,
        block: &BlockIdentifier,
    ) -> Result<()> {
        if let Some(message) = self.rejection().await {
            bail!("{message}");
        }
        self.failed.lock().await.push(FailureRecord {
            kind,
            account: account.clone(),
            currency: currency.clone(),
            cached_value: cached_value.to_string(),
            live_value: live_value.to_string(),
            block: block.clone(),
        });
        Ok(())
    }
}
