//! Inactive reconciliation loop: periodic resweep on a confirmation-depth
//! cadence.
//!
//! The rotation ring re-verifies every tracked account even when nothing
//! appears to change, catching silent drift and dormant-account corruption.
//! Entries are appended to the tail and only the front is examined, so each
//! account comes due roughly once per `required_depth_inactive`
//! confirmations, modulo queue throughput.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use dw_types::{BlockIdentifier, InactiveEntry, PartialBlockIdentifier};

use crate::boundary::ReconciliationKind;
use crate::reconciler::Reconciler;
use crate::retrieval::best_live_balance;

impl Reconciler {
    /// Rotate the inactive queue until cancellation.
    pub async fn run_inactive(&self, cancel: CancellationToken) -> Result<()> {
        info!("inactive reconciliation loop started");
        loop {
            if cancel.is_cancelled() {
                info!("inactive reconciliation loop stopping");
                return Ok(());
            }

            let head = match self.helper.current_block().await {
                Ok(head) => head,
                Err(err) => {
                    debug!("no synced head yet ({err:#}); waiting");
                    if self.idle(&cancel).await {
                        continue;
                    }
                    info!("inactive reconciliation loop stopping");
                    return Ok(());
                }
            };

            let Some(entry) = self
                .state
                .pop_eligible_inactive(head.index, self.config.required_depth_inactive)
                .await
            else {
                if self.idle(&cancel).await {
                    continue;
                }
                info!("inactive reconciliation loop stopping");
                return Ok(());
            };

            self.stats.inc_inactive_checked();
            if let Err(err) = self.process_inactive_entry(&entry, &head, &cancel).await {
                self.stats.inc_faults();
                error!(
                    "inactive resweep of {}:{} faulted: {err:#}",
                    entry.account_currency.account.address, entry.account_currency.currency.symbol
                );
            }
        }
    }

    /// Resweep one due entry against the current head.
    async fn process_inactive_entry(
        &self,
        entry: &InactiveEntry,
        head: &BlockIdentifier,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let account = &entry.account_currency.account;
        let currency = &entry.account_currency.currency;

        let resolved = best_live_balance(
            self.fetcher.as_ref(),
            &self.network,
            account,
            currency,
            Some(PartialBlockIdentifier::from(head)),
            self.config.lookup_balance_by_block,
        )
        .await;

        let (live_block, live_amount) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                // The coordinator never ran, so its bookkeeping never ran;
                // requeue here or the account falls out of rotation.
                self.state
                    .requeue_inactive(entry.account_currency.clone(), head.clone())
                    .await;
                return Err(err);
            }
        };

        let outcome = self
            .reconcile_account(
                ReconciliationKind::Inactive,
                account,
                currency,
                &live_amount.value,
                &live_block,
                cancel,
            )
            .await?;

        debug!(
            account = %account.address,
            currency = %currency.symbol,
            matched = outcome.is_matched(),
            skipped = outcome.is_skipped(),
            "inactive resweep resolved"
        );
        Ok(())
    }

    /// Sleep one idle interval; `false` once cancellation fired.
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.inactive_sleep()) => true,
        }
    }
}
