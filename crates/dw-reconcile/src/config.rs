//! Engine configuration.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dw_types::AccountCurrency;

fn default_lookup_balance_by_block() -> bool {
    true
}

fn default_required_depth_inactive() -> i64 {
    500
}

fn default_wait_to_check_diff() -> i64 {
    10
}

fn default_wait_to_check_diff_sleep_ms() -> u64 {
    5_000
}

fn default_inactive_sleep_ms() -> u64 {
    5_000
}

/// Tuning and seeding knobs for the reconciliation engine. Every field has
/// a serde default, so a partial (or empty) JSON document is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Fetch live balances at the event's block instead of the live head.
    #[serde(default = "default_lookup_balance_by_block")]
    pub lookup_balance_by_block: bool,

    /// Minimum confirmations between periodic resweeps of the same account.
    #[serde(default = "default_required_depth_inactive")]
    pub required_depth_inactive: i64,

    /// Block-lag threshold below which a lagging active check waits for the
    /// head to catch up rather than giving up.
    #[serde(default = "default_wait_to_check_diff")]
    pub wait_to_check_diff: i64,

    /// Backoff while waiting for that lag to close.
    #[serde(default = "default_wait_to_check_diff_sleep_ms")]
    pub wait_to_check_diff_sleep_ms: u64,

    /// Idle backoff for the periodic loop while no head is synced or no
    /// rotation entry is due.
    #[serde(default = "default_inactive_sleep_ms")]
    pub inactive_sleep_ms: u64,

    /// Watch-list accounts force-checked on every queued batch, observed
    /// change or not.
    #[serde(default)]
    pub interesting_accounts: Vec<AccountCurrency>,

    /// Accounts pre-seeded into the periodic rotation at startup.
    #[serde(default)]
    pub seen_accounts: Vec<AccountCurrency>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            lookup_balance_by_block: default_lookup_balance_by_block(),
            required_depth_inactive: default_required_depth_inactive(),
            wait_to_check_diff: default_wait_to_check_diff(),
            wait_to_check_diff_sleep_ms: default_wait_to_check_diff_sleep_ms(),
            inactive_sleep_ms: default_inactive_sleep_ms(),
            interesting_accounts: Vec::new(),
            seen_accounts: Vec::new(),
        }
    }
}

impl ReconcilerConfig {
    pub fn wait_to_check_diff_sleep(&self) -> Duration {
        Duration::from_millis(self.wait_to_check_diff_sleep_ms)
    }

    pub fn inactive_sleep(&self) -> Duration {
        Duration::from_millis(self.inactive_sleep_ms)
    }
}

/// Load a watch-list of (account, currency) pairs from a JSON file.
pub fn load_watch_list(path: &str) -> Result<Vec<AccountCurrency>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read watch list: {path}"))?;
    let accounts: Vec<AccountCurrency> =
        serde_json::from_str(&raw).with_context(|| format!("parse watch list: {path}"))?;
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: ReconcilerConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.lookup_balance_by_block);
        assert_eq!(cfg.required_depth_inactive, 500);
        assert_eq!(cfg.wait_to_check_diff, 10);
        assert_eq!(cfg.wait_to_check_diff_sleep(), Duration::from_secs(5));
        assert!(cfg.interesting_accounts.is_empty());
        assert!(cfg.seen_accounts.is_empty());
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let cfg: ReconcilerConfig =
            serde_json::from_str(r#"{"required_depth_inactive": 64, "lookup_balance_by_block": false}"#)
                .unwrap();
        assert!(!cfg.lookup_balance_by_block);
        assert_eq!(cfg.required_depth_inactive, 64);
        assert_eq!(cfg.wait_to_check_diff, 10);
    }

    #[test]
    fn watch_list_parses_account_currency_pairs() {
        let doc = r#"[
            {
                "account": {"address": "addr1"},
                "currency": {"symbol": "BTC", "decimals": 8}
            }
        ]"#;
        let accounts: Vec<AccountCurrency> = serde_json::from_str(doc).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account.address, "addr1");
        assert_eq!(accounts[0].currency.symbol, "BTC");
    }
}
