// =============================================================================
// Commodity Channel Index (CCI)
// =============================================================================
//
//   TP   = (H + L + C) / 3
//   CCI  = (TP - SMA_p(TP)) / (0.015 * MD_p(TP))
//
// where MD is the mean absolute deviation of TP about its window mean. A flat
// window has MD == 0 and yields `None`.
// =============================================================================

use super::{check_aligned, check_period, finite, FormulaError, Series};

/// Lambert's scaling constant; keeps roughly 70-80% of values within ±100.
const CCI_CONSTANT: f64 = 0.015;

pub fn cci(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;
    check_aligned(high, low, close)?;

    let len = close.len();
    let mut out = vec![None; len];
    if len < period {
        return Ok(out);
    }

    let typical: Vec<f64> = (0..len).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();

    for i in (period - 1)..len {
        let window = &typical[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let mean_dev = window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
        if mean_dev == 0.0 {
            continue;
        }
        out[i] = finite((typical[i] - mean) / (CCI_CONSTANT * mean_dev));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cci_null_prefix() {
        let high = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let low = [8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let close = [9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let out = cci(&high, &low, &close, 5).unwrap();
        assert_eq!(out.len(), close.len());
        assert!(out[..4].iter().all(Option::is_none));
        assert!(out[4..].iter().all(Option::is_some));
    }

    #[test]
    fn cci_linear_trend_value() {
        // TP = 9, 10, 11, 12, 13 => mean 11, MD = (2+1+0+1+2)/5 = 1.2
        // CCI = (13 - 11) / (0.015 * 1.2)
        let high = [10.0, 11.0, 12.0, 13.0, 14.0];
        let low = [8.0, 9.0, 10.0, 11.0, 12.0];
        let close = [9.0, 10.0, 11.0, 12.0, 13.0];
        let out = cci(&high, &low, &close, 5).unwrap();
        let expected = 2.0 / (0.015 * 1.2);
        assert!((out[4].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn cci_flat_window_is_none() {
        let flat = [5.0; 6];
        let out = cci(&flat, &flat, &flat, 3).unwrap();
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn cci_insufficient_history() {
        let out = cci(&[1.0, 2.0], &[0.5, 1.5], &[0.8, 1.8], 20).unwrap();
        assert_eq!(out, vec![None, None]);
    }
}
