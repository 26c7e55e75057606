// =============================================================================
// Recalculation Engine
// =============================================================================
//
// Folds (candle window x indicator definitions) into the results cache. There
// is no incremental path: every pass reads the whole window and the whole
// definition list and rebuilds the cache wholesale, so it holds exactly the
// ids of that pass.
//
// Triggers:
//   - on_window_updated      ingestion handed over a new window
//   - on_definition_changed  a definition was created or updated
//   - on_definition_deleted  a definition was removed; its entry is evicted
//
// Thread safety:
//   The tokio runtime is multi-threaded, so one `pass_lock` is held for the
//   whole of a pass (window replace, compute, publish) and by readers that
//   need window and results together. Definitions are read from the store
//   before the lock is taken; nothing awaits while holding it. Every
//   definition change bumps `definitions_epoch` under the lock, and a pass
//   whose list went stale meanwhile re-reads it before publishing.
//   Failures are isolated per definition and never escape a pass.
// =============================================================================

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::definitions::{DefinitionStore, StoreError};
use crate::indicators::{self, FormulaError, PriceColumns, Series};
use crate::market_data::{price_columns, Candle, CandleWindow};
use crate::results_cache::ResultsCache;
use crate::types::{IndicatorDefinition, IndicatorKind};

/// Times a pass re-reads definitions that changed under it before it
/// publishes anyway. The next pass drops whatever went stale.
const MAX_LIST_ATTEMPTS: u32 = 3;

/// Window and results read under one lock; `results[id][i]` belongs to
/// `candles[i]`.
#[derive(Debug, Clone)]
pub struct Published {
    pub candles: Vec<Candle>,
    pub results: HashMap<String, Series>,
    pub version: u64,
}

pub struct RecalcEngine {
    window: CandleWindow,
    results: ResultsCache,
    definitions: Arc<dyn DefinitionStore>,
    pass_lock: Mutex<()>,
    definitions_epoch: AtomicU64,
}

impl RecalcEngine {
    pub fn new(window_capacity: usize, definitions: Arc<dyn DefinitionStore>) -> Self {
        Self {
            window: CandleWindow::new(window_capacity),
            results: ResultsCache::new(),
            definitions,
            pass_lock: Mutex::new(()),
            definitions_epoch: AtomicU64::new(0),
        }
    }

    /// Read access to the current candle window.
    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn results(&self) -> &ResultsCache {
        &self.results
    }

    /// Read-only snapshot of every cached series, keyed by definition id.
    pub fn get_results(&self) -> HashMap<String, Series> {
        self.results.snapshot()
    }

    /// Window and results of the same pass.
    pub fn published(&self) -> Published {
        let _pass = self.pass_lock.lock();
        Published {
            candles: self.window.snapshot(),
            results: self.results.snapshot(),
            version: self.results.version(),
        }
    }

    // ── Passes ──────────────────────────────────────────────────────────

    /// Recompute every known definition over the current window.
    ///
    /// An empty window leaves the cache untouched.
    pub async fn recompute_all(&self) -> Result<(), StoreError> {
        let (defs, _pass) = self.definitions_under_lock().await?;
        self.run_pass(&defs);
        Ok(())
    }

    /// Recompute a single definition and publish its series.
    ///
    /// Returns the fresh series so callers can serve it immediately. With an
    /// empty window the cache is left untouched and an empty series returned.
    pub fn recompute_one(&self, def: &IndicatorDefinition) -> Series {
        let _pass = self.pass_lock.lock();
        self.definitions_epoch.fetch_add(1, Ordering::SeqCst);

        let candles = self.window.snapshot();
        if candles.is_empty() {
            debug!(id = %def.id, "candle window empty, nothing to compute");
            return Vec::new();
        }

        let series = evaluate(def, &candles);
        self.results.publish([(def.id.clone(), series.clone())]);
        series
    }

    // ── Triggers ────────────────────────────────────────────────────────

    /// Replace the window with `batch` and recompute everything, as one pass.
    /// Returns the number of candles retained in the window.
    ///
    /// An empty batch keeps the current window and results. If definitions
    /// cannot be listed the window is not replaced either.
    pub async fn on_window_updated(&self, batch: Vec<Candle>) -> Result<usize, StoreError> {
        if batch.is_empty() {
            warn!("empty candle batch, keeping current window");
            return Ok(self.window.len());
        }

        let (defs, _pass) = self.definitions_under_lock().await?;
        let retained = self.window.replace(batch);
        self.run_pass(&defs);
        Ok(retained)
    }

    pub fn on_definition_changed(&self, def: &IndicatorDefinition) -> Series {
        self.recompute_one(def)
    }

    /// Evict the cached series of a deleted definition.
    pub fn on_definition_deleted(&self, id: &str) -> bool {
        let _pass = self.pass_lock.lock();
        self.definitions_epoch.fetch_add(1, Ordering::SeqCst);
        let evicted = self.results.evict(id);
        debug!(id = %id, evicted, "definition deleted");
        evicted
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// List definitions, then take `pass_lock`. Re-lists when a definition
    /// changed between the read and the lock.
    async fn definitions_under_lock(
        &self,
    ) -> Result<(Vec<IndicatorDefinition>, MutexGuard<'_, ()>), StoreError> {
        let mut attempt = 1;
        loop {
            let epoch = self.definitions_epoch.load(Ordering::SeqCst);
            let defs = self.definitions.list_definitions().await.map_err(|e| {
                error!(error = %e, "failed to list indicator definitions");
                e
            })?;

            let guard = self.pass_lock.lock();
            if epoch == self.definitions_epoch.load(Ordering::SeqCst) || attempt == MAX_LIST_ATTEMPTS {
                return Ok((defs, guard));
            }
            drop(guard);
            debug!(attempt, "definitions changed while listing, re-reading");
            attempt += 1;
        }
    }

    /// Caller must hold `pass_lock`.
    fn run_pass(&self, defs: &[IndicatorDefinition]) {
        let candles = self.window.snapshot();
        if candles.is_empty() {
            debug!("candle window empty, skipping recompute pass");
            return;
        }

        let started = Instant::now();
        let batch: Vec<(String, Series)> = defs
            .iter()
            .map(|def| (def.id.clone(), evaluate(def, &candles)))
            .collect();
        self.results.replace_all(batch);

        info!(
            definitions = defs.len(),
            candles = candles.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "recompute pass complete"
        );
    }
}

/// Compute one definition over `candles`, isolating every failure.
///
/// Unrecognized kinds, formula errors and formula panics all degrade to an
/// empty series for that definition.
pub fn evaluate(def: &IndicatorDefinition, candles: &[Candle]) -> Series {
    evaluate_with(def, candles, indicators::compute)
}

fn evaluate_with<F>(def: &IndicatorDefinition, candles: &[Candle], compute: F) -> Series
where
    F: FnOnce(&IndicatorKind, &PriceColumns, usize) -> Result<Series, FormulaError>,
{
    if let IndicatorKind::Unrecognized(name) = &def.kind {
        warn!(id = %def.id, kind = %name, "unrecognized indicator kind, publishing empty series");
        return Vec::new();
    }

    let cols = price_columns(candles, def.kind.needs_high_low());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| compute(&def.kind, &cols, def.period)));

    match outcome {
        Ok(Ok(series)) => {
            debug!(
                id = %def.id,
                kind = %def.kind,
                period = def.period,
                defined = series.iter().filter(|v| v.is_some()).count(),
                "indicator computed"
            );
            series
        }
        Ok(Err(e)) => {
            error!(id = %def.id, kind = %def.kind, period = def.period, error = %e, "indicator computation failed");
            Vec::new()
        }
        Err(_) => {
            error!(id = %def.id, kind = %def.kind, period = def.period, "indicator computation panicked");
            Vec::new()
        }
    }
}
