//! Exact decimal arithmetic over balance-value strings.
//!
//! Values stay strings at rest and parse through `BigDecimal` only at the
//! comparison site. No floating point anywhere on this path.

use std::str::FromStr;

use anyhow::{Context, Result};
use bigdecimal::{BigDecimal, Zero};

/// Parse an exact base-10 decimal value string.
pub fn parse_value(value: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(value.trim())
        .with_context(|| format!("invalid decimal value string: {value:?}"))
}

/// Exact `left − right`, returned as a normalized decimal string
/// (no trailing fractional zeros).
pub fn subtract_values(left: &str, right: &str) -> Result<String> {
    let l = parse_value(left)?;
    let r = parse_value(right)?;
    Ok((l - r).normalized().to_string())
}

/// `true` when `value` parses to exactly zero.
pub fn is_zero_value(value: &str) -> Result<bool> {
    Ok(parse_value(value)?.is_zero())
}
