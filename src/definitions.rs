// =============================================================================
// Indicator Definition Store
// =============================================================================
//
// Holds the user-configured list of indicator definitions (id, kind, period).
// The engine only reads from it; the API creates, updates and deletes.
//
// `JsonDefinitionStore` keeps the list in memory and, when given a path,
// mirrors every change to a JSON file using an atomic tmp + rename write so a
// crash mid-write never leaves a truncated file behind.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{IndicatorDefinition, IndicatorKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("indicator definition '{0}' not found")]
    NotFound(String),

    #[error("failed to persist indicator definitions: {0}")]
    Persist(String),
}

/// Read/write access to indicator definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// All definitions in creation order.
    async fn list_definitions(&self) -> Result<Vec<IndicatorDefinition>, StoreError>;

    async fn get_definition(&self, id: &str) -> Result<Option<IndicatorDefinition>, StoreError>;

    /// Create a definition with a fresh id.
    async fn create(&self, kind: IndicatorKind, period: usize) -> Result<IndicatorDefinition, StoreError>;

    /// Change kind and/or period of an existing definition.
    async fn update(
        &self,
        id: &str,
        kind: Option<IndicatorKind>,
        period: Option<usize>,
    ) -> Result<IndicatorDefinition, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct JsonDefinitionStore {
    definitions: RwLock<Vec<IndicatorDefinition>>,
    path: Option<PathBuf>,
    /// Serialises mutations so file writes land in the same order as the
    /// in-memory changes they mirror.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonDefinitionStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_definitions(Vec::new(), None)
    }

    fn with_definitions(definitions: Vec<IndicatorDefinition>, path: Option<PathBuf>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
            path,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the store backed by `path`. A missing file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let definitions: Vec<IndicatorDefinition> = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse indicator definitions from {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no definitions file yet, starting empty");
                Vec::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read indicator definitions from {}", path.display()));
            }
        };

        for def in definitions.iter().filter(|d| !d.kind.is_recognized()) {
            warn!(id = %def.id, kind = %def.kind, "stored definition has an unrecognized kind");
        }
        info!(path = %path.display(), count = definitions.len(), "indicator definitions loaded");

        Ok(Self::with_definitions(definitions, Some(path.to_path_buf())))
    }

    /// Apply `mutate` to the list and persist the result.
    async fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut Vec<IndicatorDefinition>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;

        let (value, content) = {
            let mut defs = self.definitions.write();
            let value = mutate(&mut defs)?;
            let content = match &self.path {
                Some(_) => Some(
                    serde_json::to_string_pretty(&*defs)
                        .map_err(|e| StoreError::Persist(e.to_string()))?,
                ),
                None => None,
            };
            (value, content)
        };

        if let (Some(path), Some(content)) = (&self.path, content) {
            write_atomic(path, &content)
                .await
                .map_err(|e| StoreError::Persist(format!("{e:#}")))?;
        }
        Ok(value)
    }
}

/// Write to a temporary sibling file, then rename over the target.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    tokio::fs::write(&tmp_path, content)
        .await
        .with_context(|| format!("failed to write tmp definitions to {}", tmp_path.display()))?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("failed to rename tmp definitions to {}", path.display()))?;

    Ok(())
}

#[async_trait]
impl DefinitionStore for JsonDefinitionStore {
    async fn list_definitions(&self) -> Result<Vec<IndicatorDefinition>, StoreError> {
        Ok(self.definitions.read().clone())
    }

    async fn get_definition(&self, id: &str) -> Result<Option<IndicatorDefinition>, StoreError> {
        Ok(self.definitions.read().iter().find(|d| d.id == id).cloned())
    }

    async fn create(&self, kind: IndicatorKind, period: usize) -> Result<IndicatorDefinition, StoreError> {
        let def = IndicatorDefinition::new(uuid::Uuid::new_v4().to_string(), kind, period);
        let created = def.clone();
        self.mutate(move |defs| {
            defs.push(def);
            Ok(())
        })
        .await?;

        info!(id = %created.id, kind = %created.kind, period = created.period, "indicator definition created");
        Ok(created)
    }

    async fn update(
        &self,
        id: &str,
        kind: Option<IndicatorKind>,
        period: Option<usize>,
    ) -> Result<IndicatorDefinition, StoreError> {
        let updated = self
            .mutate(|defs| {
                let def = defs
                    .iter_mut()
                    .find(|d| d.id == id)
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                if let Some(kind) = kind {
                    def.kind = kind;
                }
                if let Some(period) = period {
                    def.period = period;
                }
                Ok(def.clone())
            })
            .await?;

        info!(id = %updated.id, kind = %updated.kind, period = updated.period, "indicator definition updated");
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|defs| {
            let before = defs.len();
            defs.retain(|d| d.id != id);
            if defs.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
        .await?;

        info!(id = %id, "indicator definition deleted");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("indicators-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn create_list_get() {
        let store = JsonDefinitionStore::in_memory();
        let a = store.create(IndicatorKind::Sma, 5).await.unwrap();
        let b = store.create(IndicatorKind::Rsi, 14).await.unwrap();
        assert_ne!(a.id, b.id);

        let all = store.list_definitions().await.unwrap();
        assert_eq!(all, vec![a.clone(), b]);
        assert_eq!(store.get_definition(&a.id).await.unwrap(), Some(a));
        assert_eq!(store.get_definition("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let store = JsonDefinitionStore::in_memory();
        let def = store.create(IndicatorKind::Ema, 9).await.unwrap();

        let updated = store.update(&def.id, None, Some(21)).await.unwrap();
        assert_eq!(updated.kind, IndicatorKind::Ema);
        assert_eq!(updated.period, 21);

        let updated = store.update(&def.id, Some(IndicatorKind::Wma), None).await.unwrap();
        assert_eq!(updated.kind, IndicatorKind::Wma);
        assert_eq!(updated.period, 21);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = JsonDefinitionStore::in_memory();
        assert!(matches!(
            store.update("nope", None, Some(3)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_definition() {
        let store = JsonDefinitionStore::in_memory();
        let def = store.create(IndicatorKind::Cci, 20).await.unwrap();
        store.delete(&def.id).await.unwrap();
        assert!(store.list_definitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn changes_survive_reopen() {
        let path = temp_path();
        {
            let store = JsonDefinitionStore::open(&path).unwrap();
            store.create(IndicatorKind::Atr, 14).await.unwrap();
            store.create(IndicatorKind::WilliamsR, 10).await.unwrap();
        }

        let reopened = JsonDefinitionStore::open(&path).unwrap();
        let defs = reopened.list_definitions().await.unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind, IndicatorKind::Atr);
        assert_eq!(defs[1].period, 10);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_keeps_unrecognized_kinds() {
        let path = temp_path();
        std::fs::write(&path, r#"[{"id":"x","kind":"macd","period":12}]"#).unwrap();

        let store = JsonDefinitionStore::open(&path).unwrap();
        let defs = store.definitions.read().clone();
        assert_eq!(defs[0].kind, IndicatorKind::Unrecognized("macd".into()));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonDefinitionStore::open(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
