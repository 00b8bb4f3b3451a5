//! Reconciliation coordinator.
//!
//! Drives one account/claim through the comparator with wait-or-throttle
//! retry, resolves one of four terminal outcomes (matched, mismatched,
//! skipped, fault) and dispatches callbacks with no ambiguity: the success
//! callback fires only for `Matched`, the failure callback only for
//! `Mismatched`, and a skip fires neither.

use std::fmt;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dw_types::{is_zero_value, AccountCurrency, AccountIdentifier, BlockIdentifier, Currency};

use crate::boundary::ReconciliationKind;
use crate::compare::{compare_balance, CompareResult, Comparison};
use crate::reconciler::Reconciler;

/// Why an attempt resolved without a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The verifier's head never caught up to the claim within the
    /// configured lag budget; the claim was abandoned and the stale-event
    /// watermark raised.
    HeadFellBehind { claimed_index: i64, head_index: i64 },
    /// A reorganization orphaned the claimed block.
    BlockGone { index: i64 },
    /// The cached balance moved past the claimed block under concurrent
    /// indexing.
    AccountUpdated {
        claimed_index: i64,
        balance_index: i64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HeadFellBehind {
                claimed_index,
                head_index,
            } => write!(f, "head fell behind claim (claim={claimed_index} head={head_index})"),
            SkipReason::BlockGone { index } => write!(f, "claimed block orphaned (index={index})"),
            SkipReason::AccountUpdated {
                claimed_index,
                balance_index,
            } => write!(
                f,
                "account updated past claim (claim={claimed_index} balance={balance_index})"
            ),
        }
    }
}

/// Terminal outcome of one coordinator call. Faults travel on the `Err`
/// channel of the call itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Cached and live balances agree exactly.
    Matched,
    /// Drift detected and reported to the failure sink.
    Mismatched,
    /// No verdict possible for this claim; no callback owed.
    Skipped(SkipReason),
}

impl ReconcileOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ReconcileOutcome::Matched)
    }

    pub fn is_mismatched(&self) -> bool {
        matches!(self, ReconcileOutcome::Mismatched)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ReconcileOutcome::Skipped(_))
    }
}

/// Internal resolution of the comparator retry loop.
enum Attempt {
    Completed(Comparison),
    Abandoned(SkipReason),
}

impl Reconciler {
    /// Reconcile one claim: compare (with wait-or-throttle retry), run
    /// rotation bookkeeping, then dispatch exactly the callback the outcome
    /// owes. A callback error aborts the call as a fault.
    pub(crate) async fn reconcile_account(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        live_value: &str,
        live_block: &BlockIdentifier,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let attempt = self
            .attempt_comparison(account, currency, live_value, live_block, cancel)
            .await;

        // Bookkeeping runs for every attempt, faulted or not, so a bad
        // attempt never drops an account out of the resweep rotation.
        self.bookkeep(kind, account, currency, live_block).await;

        match attempt? {
            Attempt::Abandoned(reason) => {
                self.stats.inc_skipped();
                debug!(
                    kind = kind.as_str(),
                    account = %account.address,
                    currency = %currency.symbol,
                    %reason,
                    "reconciliation skipped"
                );
                Ok(ReconcileOutcome::Skipped(reason))
            }
            Attempt::Completed(comparison) => {
                if is_zero_value(&comparison.difference)? {
                    self.stats.inc_matched();
                    self.handler
                        .reconciliation_succeeded(kind, account, currency, live_value, live_block)
                        .await
                        .context("success callback rejected the result")?;
                    Ok(ReconcileOutcome::Matched)
                } else {
                    self.stats.inc_mismatched();
                    warn!(
                        kind = kind.as_str(),
                        account = %account.address,
                        currency = %currency.symbol,
                        cached = %comparison.cached_value,
                        live = %live_value,
                        difference = %comparison.difference,
                        head_index = comparison.head_index,
                        "balance drift detected"
                    );
                    self.handler
                        .reconciliation_failed(
                            kind,
                            account,
                            currency,
                            &comparison.cached_value,
                            live_value,
                            live_block,
                        )
                        .await
                        .context("failure callback rejected the result")?;
                    Ok(ReconcileOutcome::Mismatched)
                }
            }
        }
    }

    /// Run the comparator until it completes, the claim is abandoned, or a
    /// fault escapes. `HeadBehindLive` within the lag budget waits and
    /// retries the same claim, unbounded; past the budget it raises the
    /// watermark and abandons.
    async fn attempt_comparison(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        live_value: &str,
        live_block: &BlockIdentifier,
        cancel: &CancellationToken,
    ) -> Result<Attempt> {
        loop {
            let result = compare_balance(
                self.helper.as_ref(),
                account,
                currency,
                live_value,
                live_block,
            )
            .await?;

            match result {
                CompareResult::Ready(comparison) => return Ok(Attempt::Completed(comparison)),
                CompareResult::HeadBehindLive {
                    claimed_index,
                    head_index,
                } => {
                    if claimed_index - head_index < self.config.wait_to_check_diff {
                        debug!(
                            claimed_index,
                            head_index, "claim ahead of head within lag budget; waiting"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Ok(Attempt::Abandoned(SkipReason::HeadFellBehind {
                                    claimed_index,
                                    head_index,
                                }));
                            }
                            _ = tokio::time::sleep(self.config.wait_to_check_diff_sleep()) => {}
                        }
                        continue;
                    }

                    if self.state.raise_watermark(claimed_index).await {
                        warn!(
                            claimed_index,
                            head_index,
                            "verifier too far behind live head; raising stale-event watermark"
                        );
                    }
                    return Ok(Attempt::Abandoned(SkipReason::HeadFellBehind {
                        claimed_index,
                        head_index,
                    }));
                }
                CompareResult::BlockGone { block } => {
                    return Ok(Attempt::Abandoned(SkipReason::BlockGone { index: block.index }));
                }
                CompareResult::AccountUpdated {
                    claimed_index,
                    balance_index,
                } => {
                    return Ok(Attempt::Abandoned(SkipReason::AccountUpdated {
                        claimed_index,
                        balance_index,
                    }));
                }
            }
        }
    }

    /// Rotation bookkeeping after an attempt: the active path seeds an
    /// identity at most once ever; the inactive path unconditionally
    /// requeues its own entry, stamped with the block just checked.
    async fn bookkeep(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        checked_at: &BlockIdentifier,
    ) {
        let account_currency = AccountCurrency::of(account, currency);
        match kind {
            ReconciliationKind::Active => {
                if self
                    .state
                    .seed_if_unseen(account_currency, checked_at.clone())
                    .await
                {
                    debug!(
                        account = %account.address,
                        currency = %currency.symbol,
                        "seeded account into periodic rotation"
                    );
                }
            }
            ReconciliationKind::Inactive => {
                self.state
                    .requeue_inactive(account_currency, checked_at.clone())
                    .await;
            }
        }
    }
}
