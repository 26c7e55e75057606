// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_0      = close_0
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The series is seeded with the first close, so there is no null prefix.
// =============================================================================

use super::{check_period, finite, FormulaError, Series};

/// Compute the EMA series for `closes` with look-back `period`.
///
/// # Edge cases
/// - `period == 0` => `FormulaError::InvalidPeriod`
/// - empty input => empty series
/// - a non-finite close poisons every later value; those positions are `None`
pub fn ema(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;

    let multiplier = 2.0 / (period + 1) as f64;
    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;

    for &close in closes {
        let value = match prev {
            None => close,
            Some(prev_ema) => close * multiplier + prev_ema * (1.0 - multiplier),
        };
        prev = Some(value);
        out.push(finite(value));
    }

    Ok(out)
}
