// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of every indicator the service can
// publish. Each formula takes one or more price columns aligned by candle
// index and returns a `Series` of exactly the same length: position `i` of the
// output belongs to candle `i` of the window.
//
// Uniform edge-case policy:
//   - insufficient history  => `None` at that position (null-padded prefix)
//   - zero denominator      => `None` at that position
//   - non-finite arithmetic => normalised to `None`
//   - structurally invalid input (zero period, misaligned columns) => `Err`

pub mod atr;
pub mod cci;
pub mod ema;
pub mod ma;
pub mod roc;
pub mod rsi;
pub mod williams_r;

use thiserror::Error;

use crate::types::IndicatorKind;

/// One value per candle; `None` where the indicator is undefined.
pub type Series = Vec<Option<f64>>;

/// Structural failures a formula refuses to compute through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("period must be at least 1")]
    InvalidPeriod,

    #[error("input columns differ in length (high={high}, low={low}, close={close})")]
    LengthMismatch { high: usize, low: usize, close: usize },

    #[error("no formula for indicator kind '{0}'")]
    UnknownKind(String),
}

/// Price columns extracted from a candle window.
///
/// `high` and `low` are only populated when the requested kind reads them.
#[derive(Debug, Clone, Default)]
pub struct PriceColumns {
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

/// Dispatch one indicator kind to its formula.
pub fn compute(kind: &IndicatorKind, cols: &PriceColumns, period: usize) -> Result<Series, FormulaError> {
    match kind {
        IndicatorKind::Sma => ma::sma(&cols.close, period),
        IndicatorKind::Ema => ema::ema(&cols.close, period),
        IndicatorKind::Wma => ma::wma(&cols.close, period),
        IndicatorKind::Rsi => rsi::rsi(&cols.close, period),
        IndicatorKind::Roc => roc::roc(&cols.close, period),
        IndicatorKind::Momentum => roc::momentum(&cols.close, period),
        IndicatorKind::WilliamsR => williams_r::williams_r(&cols.high, &cols.low, &cols.close, period),
        IndicatorKind::Atr => atr::atr(&cols.high, &cols.low, &cols.close, period),
        IndicatorKind::Cci => cci::cci(&cols.high, &cols.low, &cols.close, period),
        IndicatorKind::Unrecognized(name) => Err(FormulaError::UnknownKind(name.clone())),
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Map a raw value to a series entry, dropping NaN and infinities.
#[inline]
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub(crate) fn check_period(period: usize) -> Result<(), FormulaError> {
    if period == 0 {
        Err(FormulaError::InvalidPeriod)
    } else {
        Ok(())
    }
}

pub(crate) fn check_aligned(high: &[f64], low: &[f64], close: &[f64]) -> Result<(), FormulaError> {
    if high.len() != close.len() || low.len() != close.len() {
        return Err(FormulaError::LengthMismatch {
            high: high.len(),
            low: low.len(),
            close: close.len(),
        });
    }
    Ok(())
}

/// Simple rolling mean over `period` values. The first `period - 1`
/// positions are `None`; a window containing a non-finite value yields `None`.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        out[i] = finite(mean);
    }
    out
}
