//! Live balance resolution.
//!
//! Resolves the "best" live value for an account/currency: at a specific
//! historical block when point-in-time lookup is configured, otherwise at
//! whatever the node's live head is.

use std::fmt;

use anyhow::Result;
use tracing::debug;

use dw_types::{
    AccountIdentifier, Amount, BlockIdentifier, Currency, NetworkIdentifier,
    PartialBlockIdentifier,
};

use crate::boundary::LiveBalanceFetcher;

/// The live node answered, but the requested currency was absent from its
/// balance list. An upstream data defect, not a transient race: never
/// retried, never skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCurrencyError {
    pub account_address: String,
    pub symbol: String,
}

impl fmt::Display for MissingCurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "live balance response for account {} is missing currency {}",
            self.account_address, self.symbol
        )
    }
}

impl std::error::Error for MissingCurrencyError {}

/// Fetch the live balance and extract the entry for `currency`.
///
/// When `lookup_by_block` is false the `block` reference is ignored and the
/// node is asked for its latest view.
pub(crate) async fn best_live_balance(
    fetcher: &dyn LiveBalanceFetcher,
    network: &NetworkIdentifier,
    account: &AccountIdentifier,
    currency: &Currency,
    block: Option<PartialBlockIdentifier>,
    lookup_by_block: bool,
) -> Result<(BlockIdentifier, Amount)> {
    let lookup = if lookup_by_block { block } else { None };
    let live = fetcher.account_balance(network, account, lookup).await?;

    debug!(
        account = %account.address,
        currency = %currency.symbol,
        live_block = live.block.index,
        observed_at = %live.observed_at_utc,
        "live balance resolved"
    );

    // Currency identity is structural; `metadata` object equality is
    // key-order independent.
    let amount = live
        .balances
        .iter()
        .find(|amount| amount.currency == *currency)
        .cloned()
        .ok_or_else(|| MissingCurrencyError {
            account_address: account.address.clone(),
            symbol: currency.symbol.clone(),
        })?;

    Ok((live.block, amount))
}
