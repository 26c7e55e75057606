// =============================================================================
// Simple and Weighted Moving Averages (SMA / WMA)
// =============================================================================
//
// SMA_t = (close_{t-p+1} + ... + close_t) / p
// WMA_t = (1*close_{t-p+1} + 2*close_{t-p+2} + ... + p*close_t) / (p(p+1)/2)
//
// Both need `p` closes, so positions 0..p-2 are `None`.
// =============================================================================

use super::{check_period, finite, rolling_mean, FormulaError, Series};

/// Arithmetic mean of the trailing `period` closes.
pub fn sma(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;
    Ok(rolling_mean(closes, period))
}

/// Linearly weighted mean of the trailing `period` closes; the oldest close
/// carries weight 1 and the newest carries weight `period`.
pub fn wma(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;

    let mut out = vec![None; closes.len()];
    if closes.len() < period {
        return Ok(out);
    }

    let denom = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, close)| close * (j + 1) as f64)
            .sum();
        out[i] = finite(weighted / denom);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSES: [f64; 10] = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 18.0, 17.0, 19.0];

    #[test]
    fn sma_null_prefix_then_mean() {
        let out = sma(&CLOSES, 5).unwrap();
        assert_eq!(out.len(), CLOSES.len());
        assert!(out[..4].iter().all(Option::is_none));
        assert!((out[4].unwrap() - 12.2).abs() < 1e-10);
    }

    #[test]
    fn sma_matches_window_mean_everywhere() {
        let p = 3;
        let out = sma(&CLOSES, p).unwrap();
        for i in (p - 1)..CLOSES.len() {
            let expected = CLOSES[i + 1 - p..=i].iter().sum::<f64>() / p as f64;
            assert!((out[i].unwrap() - expected).abs() < 1e-10, "index {i}");
        }
    }

    #[test]
    fn sma_empty_and_single() {
        assert!(sma(&[], 14).unwrap().is_empty());
        assert_eq!(sma(&[10.0], 5).unwrap(), vec![None]);
    }

    #[test]
    fn sma_period_one_is_identity() {
        let out = sma(&CLOSES, 1).unwrap();
        for (v, c) in out.iter().zip(CLOSES.iter()) {
            assert_eq!(v.unwrap(), *c);
        }
    }

    #[test]
    fn wma_first_value() {
        let out = wma(&CLOSES, 5).unwrap();
        assert!(out[..4].iter().all(Option::is_none));
        // (10*1 + 12*2 + 11*3 + 13*4 + 15*5) / 15 = 194 / 15
        assert!((out[4].unwrap() - 194.0 / 15.0).abs() < 1e-10);
    }

    #[test]
    fn wma_weights_recent_prices_more() {
        let rising: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let w = wma(&rising, 4).unwrap();
        let s = sma(&rising, 4).unwrap();
        assert!(w[9].unwrap() > s[9].unwrap());
    }

    #[test]
    fn wma_insufficient_history() {
        assert_eq!(wma(&[1.0, 2.0], 3).unwrap(), vec![None, None]);
    }
}
