// =============================================================================
// Relative Strength Index (RSI)
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1: Compute price changes (deltas) from consecutive closes.
// Step 2: Average gain / average loss as simple means of the trailing
//          `period` deltas (no Wilder smoothing).
// Step 3: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Position `i` needs `period` deltas, i.e. closes `i-period ..= i`, so the
// first `period` positions are `None`. A zero average loss (including a
// flat market) yields `None` rather than an infinite RS.
// =============================================================================

use super::{check_period, finite, FormulaError, Series};

/// Compute the RSI series for `closes` with look-back `period`.
pub fn rsi(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;

    let mut out = vec![None; closes.len()];
    if closes.len() <= period {
        return Ok(out);
    }

    // gains[j] / losses[j] belong to the move from close j to close j+1.
    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            if delta > 0.0 {
                (delta, 0.0)
            } else {
                (0.0, -delta)
            }
        })
        .unzip();

    let period_f = period as f64;
    for i in period..closes.len() {
        let range = i - period..i;
        let avg_gain = gains[range.clone()].iter().sum::<f64>() / period_f;
        let avg_loss = losses[range].iter().sum::<f64>() / period_f;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    Ok(out)
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    finite(100.0 - 100.0 / (1.0 + rs))
}
