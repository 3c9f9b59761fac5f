//! Local per-subject window history.
//!
//! [`WindowStore`] keeps every submitted window in submission order and can
//! persist itself as JSON. It implements both transport boundaries, so the
//! CLI and the HTTP server use it as their storage backend.

use crate::core::{TelemetryRecord, WindowAggregate};
use crate::transport::{HistorySource, TransportError, WindowSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Errors from loading or saving the store file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedWindows {
    subjects: HashMap<String, Vec<WindowAggregate>>,
}

/// Thread-safe, optionally persisted window history.
#[derive(Debug, Default)]
pub struct WindowStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    subjects: RwLock<HashMap<String, Vec<WindowAggregate>>>,
    persist_path: Option<PathBuf>,
    /// Held from snapshot to rename so saves land in order and never interleave
    save_lock: Mutex<()>,
}

impl StoreInner {
    fn save(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedWindows {
            subjects: self
                .subjects
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_string_pretty(&persisted)?)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "saved window store");
        Ok(())
    }
}

impl WindowStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, loading any existing history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let subjects = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<PersistedWindows>(&content)?.subjects
        } else {
            HashMap::new()
        };

        Ok(Self {
            inner: Arc::new(StoreInner {
                subjects: RwLock::new(subjects),
                persist_path: Some(path),
                save_lock: Mutex::new(()),
            }),
        })
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.inner.persist_path.as_deref()
    }

    /// Append a window to a subject's history.
    pub fn append(&self, subject_id: &str, aggregate: WindowAggregate) {
        let mut subjects = self.write_subjects();
        subjects
            .entry(subject_id.to_string())
            .or_default()
            .push(aggregate);
    }

    /// A subject's windows, oldest first. Unknown subjects have no history.
    pub fn history(&self, subject_id: &str) -> Vec<WindowAggregate> {
        self.read_subjects().get(subject_id).cloned().unwrap_or_default()
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_subjects().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn window_count(&self) -> usize {
        self.read_subjects().values().map(Vec::len).sum()
    }

    /// Write the store to its backing file. A no-op for in-memory stores.
    ///
    /// The file is replaced atomically; concurrent saves are serialized.
    pub fn save(&self) -> Result<(), StoreError> {
        self.inner.save()
    }

    fn read_subjects(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<WindowAggregate>>> {
        self.inner.subjects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_subjects(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<WindowAggregate>>> {
        self.inner.subjects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WindowSink for WindowStore {
    async fn submit_window(&self, record: &TelemetryRecord) -> Result<(), TransportError> {
        self.append(&record.subject_id, record.aggregate());
        if self.inner.persist_path.is_none() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.save())
            .await
            .map_err(|e| TransportError::Storage(e.to_string()))?
            .map_err(|e| {
                warn!("window kept in memory but not persisted: {e}");
                TransportError::Storage(e.to_string())
            })
    }
}

#[async_trait]
impl HistorySource for WindowStore {
    async fn fetch_history(
        &self,
        subject_id: &str,
    ) -> Result<Vec<WindowAggregate>, TransportError> {
        Ok(self.history(subject_id))
    }
}
