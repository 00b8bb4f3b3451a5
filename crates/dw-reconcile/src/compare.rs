//! Balance comparison protocol.
//!
//! Given a value the live node claims for an account at a claimed block,
//! decide deterministically whether the indexer's cached balance agrees,
//! or why the comparison cannot be made right now. The chain head moves
//! while this runs; each race is classified, never guessed at.

use anyhow::{Context, Result};
use tracing::debug;

use dw_types::{subtract_values, AccountIdentifier, BlockIdentifier, Currency};

use crate::boundary::ChainHelper;

/// A completed comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Exact decimal `cached − live`, normalized. `"0"` means agreement.
    pub difference: String,
    /// The indexer's cached value that was compared.
    pub cached_value: String,
    /// Head index the comparison was made at.
    pub head_index: i64,
}

/// Outcome of one comparison attempt, matched exhaustively by the
/// coordinator. Only `Ready` carries a verdict; the other variants say why
/// no verdict is possible for this claim right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareResult {
    Ready(Comparison),
    /// The claim is ahead of what the indexer has synced. Premature, not
    /// wrong.
    HeadBehindLive { claimed_index: i64, head_index: i64 },
    /// A reorganization orphaned the claimed block; the claim is obsolete.
    BlockGone { block: BlockIdentifier },
    /// The cached balance was updated past the claimed block; comparing
    /// would be meaningless.
    AccountUpdated {
        claimed_index: i64,
        balance_index: i64,
    },
}

/// Compare the live node's claimed `live_value` at `live_block` against the
/// indexer's cached balance. Helper failures and unparsable values propagate
/// as unclassified errors.
pub async fn compare_balance(
    helper: &dyn ChainHelper,
    account: &AccountIdentifier,
    currency: &Currency,
    live_value: &str,
    live_block: &BlockIdentifier,
) -> Result<CompareResult> {
    let head = helper
        .current_block()
        .await
        .context("fetching current head")?;

    if live_block.index > head.index {
        return Ok(CompareResult::HeadBehindLive {
            claimed_index: live_block.index,
            head_index: head.index,
        });
    }

    if !helper
        .block_exists(live_block)
        .await
        .context("checking claimed block")?
    {
        return Ok(CompareResult::BlockGone {
            block: live_block.clone(),
        });
    }

    let cached = helper
        .account_balance(account, currency, &head)
        .await
        .context("fetching cached balance")?;

    if live_block.index < cached.last_updated.index {
        return Ok(CompareResult::AccountUpdated {
            claimed_index: live_block.index,
            balance_index: cached.last_updated.index,
        });
    }

    let difference = subtract_values(&cached.amount.value, live_value)
        .context("computing balance difference")?;

    debug!(
        account = %account.address,
        currency = %currency.symbol,
        cached = %cached.amount.value,
        live = %live_value,
        %difference,
        head_index = head.index,
        "balance comparison completed"
    );

    Ok(CompareResult::Ready(Comparison {
        difference,
        cached_value: cached.amount.value,
        head_index: head.index,
    }))
}
