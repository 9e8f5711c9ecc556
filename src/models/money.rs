//! Fixed-point money helpers.
//!
//! Balances and earnings are stored as integer micro-units so that repeated
//! per-click credits never drift. JSON surfaces use decimal amounts.

use serde::Serializer;

pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Amount credited for a unique view (0.003)
pub const UNIQUE_VIEW_EARNINGS_MICROS: i64 = 3_000;

pub fn micros_to_amount(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT as f64
}

/// Converts a decimal amount to micro-units, rounding to the nearest micro.
/// Returns `None` for non-finite or out-of-range input.
pub fn amount_to_micros(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    let micros = (amount * MICROS_PER_UNIT as f64).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(micros as i64)
}

pub fn serialize_micros<S>(micros: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(micros_to_amount(*micros))
}
