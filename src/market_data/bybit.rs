// =============================================================================
// Bybit Kline Ingestion: periodic REST poll that refreshes the candle window
// =============================================================================
//
// Every cycle fetches the latest `limit` klines, converts them to oldest-first
// `Candle`s and hands the batch to the engine, which replaces the window and
// recomputes every indicator. A failed cycle is logged and skipped; the next
// one runs on the same fixed interval.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::app_state::AppState;
use crate::market_data::Candle;
use crate::runtime_config::EngineConfig;

/// Anything that can produce a fresh, complete candle window.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the current window, oldest first.
    async fn fetch_window(&self) -> Result<Vec<Candle>>;
}

/// Bybit v5 `GET /v5/market/kline` client.
#[derive(Clone)]
pub struct BybitKlineClient {
    client: reqwest::Client,
    url: String,
    category: String,
    symbol: String,
    interval: String,
    limit: usize,
}

impl BybitKlineClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        debug!(url = %config.kline_url, symbol = %config.symbol, "BybitKlineClient initialised");

        Ok(Self {
            client,
            url: config.kline_url.clone(),
            category: config.category.clone(),
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
            limit: config.window_size,
        })
    }
}

#[async_trait]
impl CandleSource for BybitKlineClient {
    #[instrument(skip(self), name = "bybit::fetch_window", fields(symbol = %self.symbol, interval = %self.interval))]
    async fn fetch_window(&self) -> Result<Vec<Candle>> {
        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("category", self.category.as_str()),
                ("symbol", self.symbol.as_str()),
                ("interval", self.interval.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("GET /v5/market/kline request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse kline response")?;

        if !status.is_success() {
            anyhow::bail!("Bybit GET /v5/market/kline returned {}: {}", status, body);
        }

        parse_kline_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a Bybit kline response into oldest-first candles.
///
/// Expected shape (rows newest first, every field a string):
/// ```json
/// { "retCode": 0, "retMsg": "OK",
///   "result": { "list": [["1670608800000","17071","17073","17027","17055.5","268611","15.74"]] } }
/// ```
pub fn parse_kline_response(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let ret_code = body["retCode"].as_i64().context("missing field retCode")?;
    if ret_code != 0 {
        let msg = body["retMsg"].as_str().unwrap_or("");
        anyhow::bail!("Bybit kline error {ret_code}: {msg}");
    }

    let rows = body["result"]["list"]
        .as_array()
        .context("missing field result.list")?;

    let mut candles = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_kline_row(row).with_context(|| format!("bad kline row {i}")))
        .collect::<Result<Vec<_>>>()?;

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn parse_kline_row(row: &serde_json::Value) -> Result<Candle> {
    let fields = row.as_array().context("kline row is not an array")?;
    if fields.len() < 7 {
        anyhow::bail!("kline row has {} fields, expected 7", fields.len());
    }

    Ok(Candle {
        timestamp: parse_string_f64(&fields[0], "start")? as i64,
        open: parse_string_f64(&fields[1], "open")?,
        high: parse_string_f64(&fields[2], "high")?,
        low: parse_string_f64(&fields[3], "low")?,
        close: parse_string_f64(&fields[4], "close")?,
        volume: parse_string_f64(&fields[5], "volume")?,
        turnover: parse_string_f64(&fields[6], "turnover")?,
    })
}

/// Helper: Bybit sends numeric values as JSON strings inside kline rows.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

/// Run one ingestion cycle: fetch, replace the window, recompute.
/// Returns the number of candles now in the window. When definitions cannot
/// be listed the cycle is skipped and the window kept.
pub async fn poll_once(source: &dyn CandleSource, state: &AppState) -> Result<usize> {
    let batch = source.fetch_window().await?;
    let retained = state
        .engine
        .on_window_updated(batch)
        .await
        .context("recompute after window update failed")?;
    state.record_fetch_ok();
    Ok(retained)
}

/// Poll `source` forever on a fixed interval. Errors never stop the loop.
pub async fn run_candle_poller(source: Arc<dyn CandleSource>, state: Arc<AppState>, every: Duration) {
    info!(every_secs = every.as_secs(), "candle poller starting");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match poll_once(source.as_ref(), &state).await {
            Ok(count) => debug!(candles = count, "candle window refreshed"),
            Err(e) => {
                warn!(error = %e, "candle fetch failed, skipping this cycle");
                state.record_fetch_error(format!("{e:#}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{DefinitionStore, JsonDefinitionStore};
    use crate::types::IndicatorKind;

    fn kline_body() -> serde_json::Value {
        serde_json::json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "symbol": "BTCUSDT",
                "list": [
                    ["1625270400000", "51500.0", "53000.0", "51000.0", "52500.0", "200.0", "10000000.0"],
                    ["1625184000000", "50500.0", "52000.0", "50000.0", "51500.0", "150.0", "7500000.0"],
                    ["1625097600000", "50000.0", "51000.0", "49000.0", "50500.0", "100.0", "5000000.0"]
                ]
            }
        })
    }

    struct StubSource(Result<Vec<Candle>, String>);

    #[async_trait]
    impl CandleSource for StubSource {
        async fn fetch_window(&self) -> Result<Vec<Candle>> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    #[test]
    fn parse_sorts_oldest_first() {
        let candles = parse_kline_response(&kline_body()).expect("should parse");
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp, 1_625_097_600_000);
        assert_eq!(candles[2].timestamp, 1_625_270_400_000);
        assert!((candles[0].close - 50500.0).abs() < f64::EPSILON);
        assert!((candles[2].turnover - 10_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rejects_error_code() {
        let body = serde_json::json!({ "retCode": 10001, "retMsg": "params error", "result": {} });
        let err = parse_kline_response(&body).unwrap_err();
        assert!(err.to_string().contains("10001"));
    }

    #[test]
    fn parse_rejects_short_row() {
        let body = serde_json::json!({ "retCode": 0, "result": { "list": [["1", "2"]] } });
        assert!(parse_kline_response(&body).is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_field() {
        let body = serde_json::json!({
            "retCode": 0,
            "result": { "list": [["1", "x", "1", "1", "1", "1", "1"]] }
        });
        assert!(parse_kline_response(&body).is_err());
    }

    #[tokio::test]
    async fn poll_once_replaces_window_and_recomputes() {
        let state = AppState::for_tests(Arc::new(JsonDefinitionStore::in_memory()));
        let def = state.definitions.create(IndicatorKind::Sma, 2).await.unwrap();

        let candles = parse_kline_response(&kline_body()).unwrap();
        let count = poll_once(&StubSource(Ok(candles)), &state).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(state.engine.window().len(), 3);

        let results = state.engine.get_results();
        let series = &results[&def.id];
        assert_eq!(series.len(), 3);
        assert_eq!(series[0], None);
        assert!((series[1].unwrap() - 51000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn poll_once_failure_leaves_window_untouched() {
        let state = AppState::for_tests(Arc::new(JsonDefinitionStore::in_memory()));
        let candles = parse_kline_response(&kline_body()).unwrap();
        poll_once(&StubSource(Ok(candles)), &state).await.unwrap();

        let failing = StubSource(Err("connection refused".into()));
        assert!(poll_once(&failing, &state).await.is_err());
        assert_eq!(state.engine.window().len(), 3);
    }

    #[tokio::test]
    async fn poll_once_empty_batch_keeps_window() {
        let state = AppState::for_tests(Arc::new(JsonDefinitionStore::in_memory()));
        let def = state.definitions.create(IndicatorKind::Sma, 2).await.unwrap();
        let candles = parse_kline_response(&kline_body()).unwrap();
        poll_once(&StubSource(Ok(candles)), &state).await.unwrap();

        let count = poll_once(&StubSource(Ok(Vec::new())), &state).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(state.engine.published().results[&def.id].len(), 3);
    }
}
