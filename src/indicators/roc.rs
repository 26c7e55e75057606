// =============================================================================
// Rate of Change (ROC) and Momentum
// =============================================================================
//
// Both compare each close with the close `period` bars earlier:
//   ROC      = ((close - close_n) / close_n) * 100
//   Momentum =   close - close_n
//
// Positive values indicate upward momentum; negative indicate downward. The
// first `period` positions have no reference close and are `None`.

use super::{check_period, finite, FormulaError, Series};

/// Percentage change against the close `period` bars earlier. A zero reference
/// close yields `None`.
pub fn roc(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    lagged(closes, period, |current, prev| {
        if prev == 0.0 {
            None
        } else {
            finite((current - prev) / prev * 100.0)
        }
    })
}

/// Absolute change against the close `period` bars earlier.
pub fn momentum(closes: &[f64], period: usize) -> Result<Series, FormulaError> {
    lagged(closes, period, |current, prev| finite(current - prev))
}

fn lagged(
    closes: &[f64],
    period: usize,
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Result<Series, FormulaError> {
    check_period(period)?;

    let mut out = vec![None; closes.len()];
    for i in period..closes.len() {
        out[i] = f(closes[i], closes[i - period]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSES: [f64; 10] = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 18.0, 17.0, 19.0];

    #[test]
    fn roc_basic() {
        let out = roc(&CLOSES, 3).unwrap();
        assert_eq!(out.len(), CLOSES.len());
        assert!(out[..3].iter().all(Option::is_none));
        // index 3: (13 - 10) / 10 * 100
        assert!((out[3].unwrap() - 30.0).abs() < 1e-10);
        // index 4: (15 - 12) / 12 * 100
        assert!((out[4].unwrap() - 25.0).abs() < 1e-10);
    }

    #[test]
    fn roc_zero_reference_is_none() {
        let out = roc(&[0.0, 1.0, 2.0], 1).unwrap();
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn roc_insufficient_data() {
        assert!(roc(&[1.0, 2.0, 3.0], 14).unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn momentum_basic() {
        let out = momentum(&CLOSES, 3).unwrap();
        assert!(out[..3].iter().all(Option::is_none));
        assert_eq!(out[3], Some(3.0));
        assert_eq!(out[4], Some(3.0));
        assert_eq!(out[9], Some(3.0));
    }

    #[test]
    fn momentum_period_equal_to_length_is_all_none() {
        assert_eq!(momentum(&[1.0, 2.0], 2).unwrap(), vec![None, None]);
    }
}
