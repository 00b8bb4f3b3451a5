//! Scenario: stale and obsolete claims are skipped. Neither callback
//! fires, but the account stays in the periodic rotation.
//!
//! # Invariants under test
//!
//! 1. A reorged-away claim block resolves as a skip: no success, no
//!    failure, and the account is still seeded into rotation.
//! 2. A claim older than the cached balance's update block likewise skips
//!    and keeps the account in rotation.
//! 3. A live response missing the requested currency is a fault, not a
//!    skip; the loop contains it and keeps running.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dw_reconcile::{Reconciler, ReconcilerConfig};
use dw_testkit::{init_test_tracing, MockChain, MockLiveSource, RecordingHandler};
use dw_types::{
    AccountCurrency, AccountIdentifier, Amount, BalanceChange, BlockIdentifier, Currency,
    NetworkIdentifier,
};

fn btc() -> Currency {
    Currency::new("BTC", 8)
}

fn eth() -> Currency {
    Currency::new("ETH", 18)
}

fn block(index: i64) -> BlockIdentifier {
    BlockIdentifier::new(index, format!("hash{index}"))
}

fn change(address: &str, index: i64) -> BalanceChange {
    BalanceChange {
        account: AccountIdentifier::new(address),
        currency: btc(),
        block: block(index),
        difference: "0".to_string(),
    }
}

struct Fixture {
    chain: Arc<MockChain>,
    live: Arc<MockLiveSource>,
    handler: Arc<RecordingHandler>,
    engine: Arc<Reconciler>,
}

fn fixture() -> Fixture {
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
            wait_to_check_diff_sleep_ms: 10,
            inactive_sleep_ms: 10,
            ..ReconcilerConfig::default()
        },
    ));
    Fixture {
        chain,
        live,
        handler,
        engine,
    }
}

fn spawn_active(engine: &Arc<Reconciler>, cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let engine = Arc::clone(engine);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = engine.run_active(cancel).await;
    })
}

#[tokio::test]
async fn reorged_claim_skips_but_stays_in_rotation() {
    let fx = fixture();
    fx.chain.set_head(block(100)).await;
    // The node still answers from block 90, but 90 was orphaned.
    fx.live
        .set_live(AccountIdentifier::new("addr1"), block(90), vec![Amount::new("500", btc())])
        .await;

    let cancel = CancellationToken::new();
    let worker = spawn_active(&fx.engine, &cancel);

    fx.engine
        .queue_changes(&block(90), vec![change("addr1", 90)])
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(fx.handler.successes().await.is_empty());
    assert!(fx.handler.failures().await.is_empty());

    let stats = fx.engine.stats().await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.faults, 0);
    assert_eq!(
        stats.inactive_queue, 1,
        "a skipped account still enters the rotation"
    );

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}

#[tokio::test]
async fn claim_behind_cached_balance_skips_but_stays_in_rotation() {
    let fx = fixture();
    fx.chain.set_head(block(100)).await;
    fx.chain.add_block(block(90)).await;
    // Cached balance already moved to block 95; a claim at 90 is obsolete.
    fx.chain
        .set_balance(
            AccountCurrency::new(AccountIdentifier::new("addr1"), btc()),
            Amount::new("500", btc()),
            block(95),
        )
        .await;
    fx.live
        .set_live(AccountIdentifier::new("addr1"), block(90), vec![Amount::new("500", btc())])
        .await;

    let cancel = CancellationToken::new();
    let worker = spawn_active(&fx.engine, &cancel);

    fx.engine
        .queue_changes(&block(90), vec![change("addr1", 90)])
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(fx.handler.successes().await.is_empty());
    assert!(fx.handler.failures().await.is_empty());

    let stats = fx.engine.stats().await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.inactive_queue, 1);

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}

#[tokio::test]
async fn missing_currency_is_a_contained_fault_not_a_skip() {
    let fx = fixture();
    fx.chain.set_head(block(100)).await;
    fx.chain
        .set_balance(
            AccountCurrency::new(AccountIdentifier::new("addr1"), btc()),
            Amount::new("500", btc()),
            block(100),
        )
        .await;
    // The node reports only ETH for this account; BTC is absent.
    fx.live
        .set_live(AccountIdentifier::new("addr1"), block(100), vec![Amount::new("1", eth())])
        .await;

    let cancel = CancellationToken::new();
    let worker = spawn_active(&fx.engine, &cancel);

    fx.engine
        .queue_changes(&block(100), vec![change("addr1", 100)])
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let stats = fx.engine.stats().await;
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.skipped, 0);
    assert!(fx.handler.successes().await.is_empty());
    assert!(fx.handler.failures().await.is_empty());

    // The loop survived the fault: a well-formed event still verifies.
    fx.live
        .set_live(AccountIdentifier::new("addr1"), block(100), vec![Amount::new("500", btc())])
        .await;
    fx.engine
        .queue_changes(&block(100), vec![change("addr1", 100)])
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(fx.handler.successes().await.len(), 1);

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}
