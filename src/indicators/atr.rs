// =============================================================================
// Average True Range (ATR)
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR_0 = H - L
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the simple rolling mean of TR over `period` bars, so positions
// 0..p-2 are `None`.
// =============================================================================

use super::{check_aligned, check_period, rolling_mean, FormulaError, Series};

/// Compute the ATR series from aligned high/low/close columns.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;
    check_aligned(high, low, close)?;
    Ok(rolling_mean(&true_range(high, low, close), period))
}

/// True range per bar. The first bar has no previous close and uses H - L.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                return hl;
            }
            let prev_close = close[i - 1];
            let hc = (high[i] - prev_close).abs();
            let lc = (low[i] - prev_close).abs();
            // f64::max drops NaN operands; a bad bar must stay NaN.
            if hl.is_nan() || hc.is_nan() || lc.is_nan() {
                return f64::NAN;
            }
            hl.max(hc).max(lc)
        })
        .collect()
}
