//! Search history port
//!
//! History is an injected collaborator with `load`/`save`/`record`, so the
//! pipeline can run without any storage backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::HistoryResult;
use crate::models::HistoryEntry;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stored entries, most recent first
    async fn load(&self) -> HistoryResult<Vec<HistoryEntry>>;

    /// Replace the stored entries
    async fn save(&self, entries: &[HistoryEntry]) -> HistoryResult<()>;

    /// Merge `entry` into the stored entries (see [`merge_entry`])
    ///
    /// The read, merge and write happen under one lock, so concurrent
    /// records never drop each other's entries.
    async fn record(&self, entry: HistoryEntry, max_entries: usize) -> HistoryResult<()>;
}

/// Prepend `entry`, dropping older entries with the same key and anything
/// beyond `max_entries`
///
/// Entries without a key are never treated as duplicates.
pub fn merge_entry(
    mut entries: Vec<HistoryEntry>,
    entry: HistoryEntry,
    max_entries: usize,
) -> Vec<HistoryEntry> {
    if let Some(key) = &entry.key {
        entries.retain(|existing| existing.key.as_ref() != Some(key));
    }
    entries.insert(0, entry);
    entries.truncate(max_entries);
    entries
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> HistoryResult<Vec<HistoryEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn save(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }

    async fn record(&self, entry: HistoryEntry, max_entries: usize) -> HistoryResult<()> {
        let mut entries = self.entries.lock().await;
        let current = std::mem::take(&mut *entries);
        *entries = merge_entry(current, entry, max_entries);
        Ok(())
    }
}

/// History persisted as a JSON array
///
/// A missing file loads as empty history. Writes go through a temp file and
/// a rename.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileHistoryStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> HistoryResult<Vec<HistoryEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history file at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Callers hold `write_lock`
    async fn write_entries(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Saved {} history entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self) -> HistoryResult<Vec<HistoryEntry>> {
        self.read_entries().await
    }

    async fn save(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_entries(entries).await
    }

    async fn record(&self, entry: HistoryEntry, max_entries: usize) -> HistoryResult<()> {
        let _guard = self.write_lock.lock().await;
        let entries = self.read_entries().await?;
        self.write_entries(&merge_entry(entries, entry, max_entries))
            .await
    }
}
