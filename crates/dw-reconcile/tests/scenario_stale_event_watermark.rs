//! Scenario: falling too far behind the live head raises the stale-event
//! watermark and throttles the backlog.
//!
//! # Invariants under test
//!
//! 1. A claim whose lag meets the configured threshold is abandoned: no
//!    callback fires, and the watermark rises to the claimed index.
//! 2. Once the watermark sits at N, a queued event below N is discarded
//!    without touching the live source or the comparator.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dw_reconcile::{Reconciler, ReconcilerConfig};
use dw_testkit::{init_test_tracing, MockChain, MockLiveSource, RecordingHandler};
use dw_types::{
    AccountIdentifier, Amount, BalanceChange, BlockIdentifier, Currency, NetworkIdentifier,
};

fn btc() -> Currency {
    Currency::new("BTC", 8)
}

fn block(index: i64) -> BlockIdentifier {
    BlockIdentifier::new(index, format!("hash{index}"))
}

fn change(index: i64) -> BalanceChange {
    BalanceChange {
        account: AccountIdentifier::new("addr1"),
        currency: btc(),
        block: block(index),
        difference: "0".to_string(),
    }
}

#[tokio::test]
async fn excessive_lag_raises_watermark_and_drops_older_events() {
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
            wait_to_check_diff: 10,
            wait_to_check_diff_sleep_ms: 10,
            inactive_sleep_ms: 10,
            ..ReconcilerConfig::default()
        },
    ));

    // The indexer head sits at 100 while the node already serves block 200:
    // a lag of 100 blocks, far past the 10-block wait budget.
    chain.set_head(block(100)).await;
    live.set_live(
        AccountIdentifier::new("addr1"),
        block(200),
        vec![Amount::new("500", btc())],
    )
    .await;

    let cancel = CancellationToken::new();
    let worker = {
        let engine = Arc::clone(&engine);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = engine.run_active(cancel).await;
        })
    };

    engine.queue_changes(&block(150), vec![change(150)]).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let stats = engine.stats().await;
    assert_eq!(stats.skipped, 1, "abandoned claim resolves as a skip");
    assert_eq!(stats.watermark_threshold, 200);
    assert!(
        handler.successes().await.is_empty(),
        "a skip owes no success callback"
    );
    assert!(handler.failures().await.is_empty());
    let requests_before = live.request_count().await;
    assert_eq!(requests_before, 1);

    // Anything older than the watermark is now dropped before retrieval.
    engine.queue_changes(&block(150), vec![change(150)]).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let stats = engine.stats().await;
    assert_eq!(stats.stale_dropped, 1);
    assert_eq!(
        live.request_count().await,
        requests_before,
        "dropped events never reach the live source"
    );

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), worker).await;
}
