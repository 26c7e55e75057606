// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the recalculation engine, the definition store and the configuration
// together and tracks ingestion health. Every async task (poller, API
// handlers, WebSocket feeds) holds an `Arc<AppState>`.
//
// Thread safety:
//   - The engine and store manage their own interior mutability.
//   - parking_lot::RwLock for ingestion status and the error ring.
//   - Atomic counters for fetch and WebSocket bookkeeping.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::definitions::DefinitionStore;
use crate::engine::RecalcEngine;
use crate::indicators::Series;
use crate::runtime_config::EngineConfig;
use crate::types::IndicatorDefinition;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded ingestion failure for the state feed.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub config: EngineConfig,

    // ── Engine & collaborators ──────────────────────────────────────────
    pub engine: Arc<RecalcEngine>,
    pub definitions: Arc<dyn DefinitionStore>,

    // ── Ingestion status ────────────────────────────────────────────────
    pub last_fetch_ok: RwLock<Option<Instant>>,
    pub last_fetch_error: RwLock<Option<String>>,
    pub fetch_count: AtomicU64,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── WebSocket bookkeeping ───────────────────────────────────────────
    pub ws_clients: AtomicUsize,
    pub ws_sequence_number: AtomicU64,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: EngineConfig, definitions: Arc<dyn DefinitionStore>) -> Self {
        let engine = Arc::new(RecalcEngine::new(config.window_size, definitions.clone()));

        Self {
            config,
            engine,
            definitions,
            last_fetch_ok: RwLock::new(None),
            last_fetch_error: RwLock::new(None),
            fetch_count: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            ws_clients: AtomicUsize::new(0),
            ws_sequence_number: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn for_tests(definitions: Arc<dyn DefinitionStore>) -> Self {
        Self::new(EngineConfig::default(), definitions)
    }

    // ── Ingestion status ────────────────────────────────────────────────

    pub fn record_fetch_ok(&self) {
        *self.last_fetch_ok.write() = Some(Instant::now());
        *self.last_fetch_error.write() = None;
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed ingestion cycle. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn record_fetch_error(&self, msg: String) {
        *self.last_fetch_error.write() = Some(msg.clone());

        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable snapshot of the whole service, served by
    /// `GET /api/v1/state` and pushed over the WebSocket feed.
    pub async fn build_snapshot(&self) -> StateSnapshot {
        let definitions = self.definitions.list_definitions().await.unwrap_or_else(|e| {
            warn!(error = %e, "snapshot built without definitions");
            Vec::new()
        });

        let published = self.engine.published();
        StateSnapshot {
            results_version: published.version,
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            symbol: self.config.symbol.clone(),
            interval: self.config.interval.clone(),
            window: WindowSnapshot {
                len: published.candles.len(),
                capacity: self.engine.window().capacity(),
                last_candle_time: published.candles.last().map(|c| c.timestamp),
            },
            ingestion: IngestionSnapshot {
                last_fetch_ok_age_s: self.last_fetch_ok.read().map(|t| t.elapsed().as_secs()),
                last_fetch_error: self.last_fetch_error.read().clone(),
                fetch_count: self.fetch_count.load(Ordering::Relaxed),
            },
            ws_clients: self.ws_clients.load(Ordering::Relaxed),
            ws_sequence_number: self.ws_sequence_number.load(Ordering::Relaxed),
            definitions,
            indicators: published.results,
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub results_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub symbol: String,
    pub interval: String,
    pub window: WindowSnapshot,
    pub ingestion: IngestionSnapshot,
    pub ws_clients: usize,
    /// Snapshots pushed over WebSocket since startup, across all clients.
    pub ws_sequence_number: u64,
    pub definitions: Vec<IndicatorDefinition>,
    pub indicators: HashMap<String, Series>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub len: usize,
    pub capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_candle_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionSnapshot {
    pub last_fetch_ok_age_s: Option<u64>,
    pub last_fetch_error: Option<String>,
    pub fetch_count: u64,
}
