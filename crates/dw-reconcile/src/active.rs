//! Active reconciliation loop: event-driven verification.
//!
//! A single serial consumer over the change queue. Each event is filtered
//! against the stale-event watermark, resolved to a live claim, and handed
//! to the coordinator. Unclassified faults are contained at the loop
//! boundary: one bad account must not halt global reconciliation.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use dw_types::{BalanceChange, PartialBlockIdentifier};

use crate::boundary::ReconciliationKind;
use crate::reconciler::Reconciler;
use crate::retrieval::best_live_balance;

impl Reconciler {
    /// Consume the active change queue until cancellation.
    pub async fn run_active(&self, cancel: CancellationToken) -> Result<()> {
        info!("active reconciliation loop started");
        loop {
            let Some(change) = self.state.pop_active(&cancel).await else {
                info!("active reconciliation loop stopping");
                return Ok(());
            };

            if self.state.is_stale(change.block.index).await {
                self.stats.inc_stale_dropped();
                debug!(
                    account = %change.account.address,
                    currency = %change.currency.symbol,
                    block_index = change.block.index,
                    "dropping balance change below stale-event watermark"
                );
                continue;
            }

            self.stats.inc_active_checked();
            if let Err(err) = self.process_active_change(&change, &cancel).await {
                self.stats.inc_faults();
                error!(
                    "active reconciliation of {}:{} faulted: {err:#}",
                    change.account.address, change.currency.symbol
                );
            }
        }
    }

    /// Resolve the live claim for one observed change and reconcile it.
    /// The live block returned by resolution, not the event's block, is
    /// the claim the comparison runs against.
    async fn process_active_change(
        &self,
        change: &BalanceChange,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (live_block, live_amount) = best_live_balance(
            self.fetcher.as_ref(),
            &self.network,
            &change.account,
            &change.currency,
            Some(PartialBlockIdentifier::from(&change.block)),
            self.config.lookup_balance_by_block,
        )
        .await?;

        let outcome = self
            .reconcile_account(
                ReconciliationKind::Active,
                &change.account,
                &change.currency,
                &live_amount.value,
                &live_block,
                cancel,
            )
            .await?;

        debug!(
            account = %change.account.address,
            currency = %change.currency.symbol,
            matched = outcome.is_matched(),
            skipped = outcome.is_skipped(),
            "active reconciliation resolved"
        );
        Ok(())
    }
}
