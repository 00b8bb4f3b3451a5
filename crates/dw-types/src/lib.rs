//! Wire-level data model shared by the reconciliation engine and its
//! collaborators (indexer, live fetcher, result sinks).
//!
//! Balance values are exact base-10 decimal strings end to end; arithmetic
//! lives in [`amount`] and goes through `BigDecimal`, never floats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod amount;
mod identity;

pub use amount::{is_zero_value, parse_value, subtract_values};
pub use identity::AccountCurrency;

/// A block on the canonical chain as currently known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIdentifier {
    pub index: i64,
    pub hash: String,
}

impl BlockIdentifier {
    pub fn new(index: i64, hash: impl Into<String>) -> Self {
        Self {
            index,
            hash: hash.into(),
        }
    }
}

/// A block reference usable for point-in-time queries, as opposed to
/// "live/latest". Either field may be given; both may be given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBlockIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl From<&BlockIdentifier> for PartialBlockIdentifier {
    fn from(block: &BlockIdentifier) -> Self {
        Self {
            index: Some(block.index),
            hash: Some(block.hash.clone()),
        }
    }
}

/// Routing tag for the live data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentifier {
    pub blockchain: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAccountIdentifier {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentifier {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<SubAccountIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AccountIdentifier {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            sub_account: None,
            metadata: None,
        }
    }
}

/// Opaque beyond identity comparison. `serde_json::Value` object equality is
/// key-order independent, so derived equality on `metadata` is structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            metadata: None,
        }
    }
}

/// An exact base-10 decimal value in a given currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: Currency,
}

impl Amount {
    pub fn new(value: impl Into<String>, currency: Currency) -> Self {
        Self {
            value: value.into(),
            currency,
        }
    }
}

/// Produced by the indexer whenever it believes an account's balance changed
/// at a given block. Also synthesized with a `"0"` difference for watch-list
/// accounts that must be checked every batch regardless of observed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub account: AccountIdentifier,
    pub currency: Currency,
    pub block: BlockIdentifier,
    pub difference: String,
}

/// One slot in the periodic-resweep rotation. `last_checked` is absent until
/// the first inactive pass completes for this account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveEntry {
    pub account_currency: AccountCurrency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<BlockIdentifier>,
}
