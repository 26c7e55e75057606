use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::indicators::PriceColumns;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle. `timestamp` is the candle start in epoch ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

// ---------------------------------------------------------------------------
// CandleWindow -- the bounded, replace-only input of every recompute pass
// ---------------------------------------------------------------------------

/// Thread-safe holder of the current candle window.
///
/// The window is never appended to: each ingestion cycle hands over a complete
/// oldest-first batch that replaces the previous content. Batches longer than
/// `capacity` keep only their newest `capacity` candles.
pub struct CandleWindow {
    candles: RwLock<Vec<Candle>>,
    capacity: usize,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Replace the whole window. Returns the number of candles retained.
    pub fn replace(&self, mut batch: Vec<Candle>) -> usize {
        if batch.len() > self.capacity {
            batch.drain(..batch.len() - self.capacity);
        }
        let retained = batch.len();
        *self.candles.write() = batch;
        retained
    }

    /// Clone of the current window (oldest first).
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.read().clone()
    }

    pub fn len(&self) -> usize {
        self.candles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Timestamp of the newest candle, if any.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.candles.read().last().map(|c| c.timestamp)
    }
}

/// Split candles into the price columns a formula reads. High and low are
/// only copied when `with_high_low` is set.
pub fn price_columns(candles: &[Candle], with_high_low: bool) -> PriceColumns {
    let close = candles.iter().map(|c| c.close).collect();
    if !with_high_low {
        return PriceColumns {
            close,
            ..PriceColumns::default()
        };
    }
    PriceColumns {
        high: candles.iter().map(|c| c.high).collect(),
        low: candles.iter().map(|c| c.low).collect(),
        close,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
