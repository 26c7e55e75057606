// =============================================================================
// Runtime Configuration: engine settings with env overrides
// =============================================================================
//
// Every tunable of the indicator service lives here: what to ingest (symbol,
// category, interval, window size), how often, where to serve the API and
// where definitions are persisted.
//
// All fields carry a serde default so an older or partial config file still
// loads. The file is read-only to the service; it is never written back.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "ENGINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "engine_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_category() -> String {
    "linear".to_string()
}

fn default_interval() -> String {
    "1".to_string()
}

fn default_window_size() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_kline_url() -> String {
    "https://api.bybit.com/v5/market/kline".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_definitions_path() -> String {
    "indicators.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    // --- Ingestion ----------------------------------------------------------

    /// Instrument whose klines feed the window.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Bybit product category (`linear`, `spot`, `inverse`).
    #[serde(default = "default_category")]
    pub category: String,

    /// Kline interval as Bybit spells it (`1`, `5`, `60`, `D`, ...).
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Candles kept in the window; also the kline `limit` requested.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_kline_url")]
    pub kline_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // --- Serving & persistence ----------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// JSON file holding the indicator definitions.
    #[serde(default = "default_definitions_path")]
    pub definitions_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            category: default_category(),
            interval: default_interval(),
            window_size: default_window_size(),
            poll_interval_secs: default_poll_interval_secs(),
            kline_url: default_kline_url(),
            request_timeout_secs: default_request_timeout_secs(),
            bind_addr: default_bind_addr(),
            definitions_path: default_definitions_path(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Load from `ENGINE_CONFIG` (or `engine_config.json`), falling back to
    /// defaults, then apply environment overrides and validate.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::load(Self::path_from_env()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load engine config, using defaults");
            Self::default()
        });
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Config file location: `ENGINE_CONFIG` or `engine_config.json`.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Apply `ENGINE_*` overrides. `lookup` resolves a variable name to its
    /// value; unparsable numbers are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(symbol) = lookup("ENGINE_SYMBOL") {
            let symbol = symbol.trim().to_uppercase();
            if !symbol.is_empty() {
                self.symbol = symbol;
            }
        }
        if let Some(interval) = lookup("ENGINE_INTERVAL") {
            self.interval = interval.trim().to_string();
        }
        if let Some(addr) = lookup("ENGINE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(path) = lookup("ENGINE_DEFINITIONS_PATH") {
            self.definitions_path = path;
        }
        if let Some(secs) = lookup("ENGINE_POLL_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.poll_interval_secs = secs,
                Err(_) => warn!(value = %secs, "ignoring invalid ENGINE_POLL_SECS"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            anyhow::bail!("window_size must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if self.symbol.is_empty() {
            anyhow::bail!("symbol must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.category, "linear");
        assert_eq!(cfg.interval, "1");
        assert_eq!(cfg.window_size, 100);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ETHUSDT", "window_size": 250 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.window_size, 250);
        assert_eq!(cfg.category, "linear");
        assert_eq!(cfg.definitions_path, "indicators.json");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(lookup_from(&[
            ("ENGINE_SYMBOL", " solusdt "),
            ("ENGINE_INTERVAL", "5"),
            ("ENGINE_POLL_SECS", "30"),
            ("ENGINE_BIND_ADDR", "127.0.0.1:9000"),
        ]));
        assert_eq!(cfg.symbol, "SOLUSDT");
        assert_eq!(cfg.interval, "5");
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn invalid_poll_override_is_ignored() {
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(lookup_from(&[("ENGINE_POLL_SECS", "soon")]));
        assert_eq!(cfg.poll_interval_secs, 10);
    }

    #[test]
    fn validate_rejects_zero_values() {
        let cfg = EngineConfig {
            window_size: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig {
            poll_interval_secs: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reads_file_written_by_hand() {
        let path = std::env::temp_dir().join(format!("engine-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "symbol": "XRPUSDT", "poll_interval_secs": 3 }"#).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.symbol, "XRPUSDT");
        assert_eq!(loaded.poll_interval_secs, 3);
        assert_eq!(loaded.window_size, 100);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
        assert!(EngineConfig::load(path).is_err());
    }
}
