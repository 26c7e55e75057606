pub mod bybit;
pub mod candle_window;

pub use bybit::{BybitKlineClient, CandleSource};
pub use candle_window::{price_columns, Candle, CandleWindow};
