//! Canonical (account, currency) identity.
//!
//! Every queue, registry, and map key in the engine uses this identity.
//! Equality and hashing are structural and field-order independent: both are
//! derived from the canonical JSON rendering of the pair, so two instances
//! built from differently-ordered source documents compare equal and hash
//! identically.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountIdentifier, Currency};

/// An (account, currency) pair treated as a single value type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCurrency {
    pub account: AccountIdentifier,
    pub currency: Currency,
}

impl AccountCurrency {
    pub fn new(account: AccountIdentifier, currency: Currency) -> Self {
        Self { account, currency }
    }

    /// Clone-free-ish constructor for call sites that hold references.
    pub fn of(account: &AccountIdentifier, currency: &Currency) -> Self {
        Self {
            account: account.clone(),
            currency: currency.clone(),
        }
    }

    /// Canonical serialization of the pair.
    ///
    /// `serde_json::Value` keeps object keys in a sorted map, so nested
    /// `metadata` objects render identically regardless of the field order
    /// they were built with.
    pub fn canonical_key(&self) -> String {
        match serde_json::to_value(self) {
            Ok(v) => v.to_string(),
            // Plain string/number fields cannot fail to serialize; keep a
            // deterministic rendering anyway rather than panic.
            Err(_) => format!("{self:?}"),
        }
    }

    /// Short stable identity for logs and registry display: sha256 hex of
    /// the canonical key.
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_key().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl PartialEq for AccountCurrency {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for AccountCurrency {}

impl Hash for AccountCurrency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.canonical_key().as_bytes());
    }
}
