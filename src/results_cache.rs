use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::indicators::Series;

/// Latest result series per indicator definition id.
///
/// Writers publish a whole batch under one write lock, so a reader never
/// observes half of a recompute pass. Every publish, replacement or eviction
/// bumps `version`, which the push feed uses to detect changes.
pub struct ResultsCache {
    series: RwLock<HashMap<String, Series>>,
    version: AtomicU64,
}

impl Default for ResultsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsCache {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Replace the entries for every id in `batch`. Ids not in the batch are
    /// left as they are.
    pub fn publish(&self, batch: impl IntoIterator<Item = (String, Series)>) {
        let mut map = self.series.write();
        for (id, series) in batch {
            map.insert(id, series);
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Swap the whole cache for `batch`. Ids not in the batch are dropped.
    pub fn replace_all(&self, batch: impl IntoIterator<Item = (String, Series)>) {
        let fresh: HashMap<String, Series> = batch.into_iter().collect();
        *self.series.write() = fresh;
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn evict(&self, id: &str) -> bool {
        let removed = self.series.write().remove(id).is_some();
        if removed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Series> {
        self.series.read().get(id).cloned()
    }

    /// Read-only copy of the whole cache.
    pub fn snapshot(&self) -> HashMap<String, Series> {
        self.series.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
