//! Scenario: the periodic loop re-verifies tracked accounts on a
//! confirmation-depth cadence.
//!
//! # Invariants under test
//!
//! 1. A pre-seeded, never-checked account is swept immediately.
//! 2. After a sweep the entry requeues itself and is not due again until
//!    the head advances past `required_depth_inactive`.
//! 3. The rotation's steady-state depth equals the number of tracked
//!    accounts.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dw_reconcile::{Reconciler, ReconcilerConfig, ReconciliationKind};
use dw_testkit::{init_test_tracing, MockChain, MockLiveSource, RecordingHandler};
use dw_types::{
    AccountCurrency, AccountIdentifier, Amount, BlockIdentifier, Currency, NetworkIdentifier,
};

fn btc() -> Currency {
    Currency::new("BTC", 8)
}

fn block(index: i64) -> BlockIdentifier {
    BlockIdentifier::new(index, format!("hash{index}"))
}

fn tracked() -> AccountCurrency {
    AccountCurrency::new(AccountIdentifier::new("dormant1"), btc())
}

#[tokio::test]
async fn preseeded_account_rotates_on_depth_cadence() {
    init_test_tracing();

    let chain = Arc::new(MockChain::new());
    let live = Arc::new(MockLiveSource::new());
    let handler = Arc::new(RecordingHandler::new());
    let engine = Arc::new(Reconciler::new(
        NetworkIdentifier {
            blockchain: "bitcoin".to_string(),
            network: "mainnet".to_string(),
        },
        chain.clone(),
        live.clone(),
        handler.clone(),
        ReconcilerConfig {
            required_depth_inactive: 5,
            inactive_sleep_ms: 10,
            wait_to_check_diff_sleep_ms: 10,
            seen_accounts: vec![tracked()],
            ..ReconcilerConfig::default()
        },
    ));

    chain.set_head(block(100)).await;
    chain
        .set_balance(tracked(), Amount::new("500", btc()), block(50))
        .await;
    live.set_live(
        AccountIdentifier::new("dormant1"),
        block(100),
        vec![Amount::new("500", btc())],
    )
    .await;

    let cancel = CancellationToken::new();
    let worker = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = engine.run_inactive(cancel).await;
        })
    };

    // Never-checked entries are due immediately.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let successes = handler.successes().await;
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].kind, ReconciliationKind::Inactive);

    // Just checked at 100 with depth 5: heads up to 105 must not resweep.
    chain.set_head(block(105)).await;
    live.set_live(
        AccountIdentifier::new("dormant1"),
        block(105),
        vec![Amount::new("500", btc())],
    )
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        handler.successes().await.len(),
        1,
        "entry must not be due before the depth cadence elapses"
    );

    // Head 106 clears the cadence (100 + 5 < 106).
    chain.set_head(block(106)).await;
    live.set_live(
        AccountIdentifier::new("dormant1"),
        block(106),
        vec![Amount::new("500", btc())],
    )
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handler.successes().await.len(), 2);

    let stats = engine.stats().await;
    assert_eq!(stats.inactive_checked, 2);
    assert_eq!(
        stats.inactive_queue, 1,
        "rotation keeps exactly one entry per tracked account"
    );
    assert!(handler.failures().await.is_empty());

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}

#[tokio::test]
async fn unsynced_head_backs_off_instead_of_failing() {
    init_test_tracing();

    let chain = Arc::new(MockChain::new());
    let live = Arc::new(MockLiveSource::new());
    let handler = Arc::new(RecordingHandler::new());
    let engine = Arc::new(Reconciler::new(
        NetworkIdentifier {
            blockchain: "bitcoin".to_string(),
            network: "mainnet".to_string(),
        },
        chain.clone(),
        live.clone(),
        handler.clone(),
        ReconcilerConfig {
            required_depth_inactive: 5,
            inactive_sleep_ms: 10,
            seen_accounts: vec![tracked()],
            ..ReconcilerConfig::default()
        },
    ));

    // No head at all yet: the loop must idle, not fault.
    let cancel = CancellationToken::new();
    let worker = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = engine.run_inactive(cancel).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.stats().await.faults, 0);
    assert!(handler.successes().await.is_empty());

    // First sync: the pre-seeded account gets swept.
    chain
        .set_balance(tracked(), Amount::new("7", btc()), block(1))
        .await;
    live.set_live(
        AccountIdentifier::new("dormant1"),
        block(10),
        vec![Amount::new("7", btc())],
    )
    .await;
    chain.set_head(block(10)).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handler.successes().await.len(), 1);

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}
