// =============================================================================
// Williams %R
// =============================================================================
//
//   %R = -100 * (HH_p - C) / (HH_p - LL_p)
//
// HH_p / LL_p are the highest high and lowest low of the trailing `period`
// bars. Output lives in [-100, 0]; a zero range yields `None`.

use super::{check_aligned, check_period, finite, FormulaError, Series};

pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Series, FormulaError> {
    check_period(period)?;
    check_aligned(high, low, close)?;

    let len = close.len();
    let mut out = vec![None; len];
    if len < period {
        return Ok(out);
    }

    for i in (period - 1)..len {
        let start = i + 1 - period;
        let highest = high[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = low[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        if range == 0.0 {
            continue;
        }
        out[i] = finite(-100.0 * (highest - close[i]) / range);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn williams_r_known_value() {
        let high = [130.0, 132.0, 131.0, 133.0, 135.0];
        let low = [126.0, 128.0, 127.0, 129.0, 131.0];
        let close = [128.0, 131.0, 129.0, 132.0, 134.0];
        let out = williams_r(&high, &low, &close, 5).unwrap();
        assert!(out[..4].iter().all(Option::is_none));
        // highest 135, lowest 126 => -100 * 1 / 9
        assert!((out[4].unwrap() + 100.0 / 9.0).abs() < 1e-10);
    }

    #[test]
    fn williams_r_bounded() {
        let high = [10.0, 12.0, 11.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let low = [8.0, 9.0, 8.0, 10.0, 11.0, 12.0, 13.0, 14.0];
        let close = [9.0, 11.0, 10.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        let out = williams_r(&high, &low, &close, 5).unwrap();
        for v in out.into_iter().flatten() {
            assert!((-100.0..=0.0).contains(&v), "%R {v} out of range");
        }
    }

    #[test]
    fn williams_r_zero_range_is_none() {
        let flat = [7.0; 4];
        let out = williams_r(&flat, &flat, &flat, 2).unwrap();
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn williams_r_close_at_extremes() {
        let high = [10.0, 10.0];
        let low = [0.0, 0.0];
        let out = williams_r(&high, &low, &[5.0, 10.0], 2).unwrap();
        assert_eq!(out[1], Some(0.0));
        let out = williams_r(&high, &low, &[5.0, 0.0], 2).unwrap();
        assert_eq!(out[1], Some(-100.0));
    }
}
