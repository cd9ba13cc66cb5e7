//! Capped, newest-first archive of past generations.
//!
//! The cache is the only code that touches the persistent store: the whole
//! sequence is rewritten after every mutation and read back once at startup.

use std::{
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::models::HistoryRecord;

pub const MAX_HISTORY: usize = 30;
pub const STORAGE_KEY: &str = "amz_genius_shareable_v1";

/// A single-value key-value slot holding the serialized history.
pub trait HistoryStore: Send {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, serialized: &str) -> io::Result<()>;
}

/// Stores the history as `<dir>/amz_genius_shareable_v1.json`.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, serialized: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // write-then-rename so readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// In-memory store, handy for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, serialized: &str) -> io::Result<()> {
        *self.value.lock() = Some(serialized.to_string());
        Ok(())
    }
}

impl<S: HistoryStore + Sync> HistoryStore for std::sync::Arc<S> {
    fn load(&self) -> io::Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, serialized: &str) -> io::Result<()> {
        (**self).save(serialized)
    }
}

pub struct HistoryCache {
    records: Vec<HistoryRecord>,
    store: Box<dyn HistoryStore>,
}

impl HistoryCache {
    /// Rehydrates from the store. Unreadable or malformed data yields an empty cache.
    pub fn load(store: Box<dyn HistoryStore>) -> Self {
        let mut records = match store.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<HistoryRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!("History parse failed, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("History read failed, starting empty: {}", e);
                Vec::new()
            }
        };
        records.truncate(MAX_HISTORY);
        info!("📚 Loaded {} history records", records.len());
        Self { records, store }
    }

    pub fn all(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_HISTORY
    }

    /// A millisecond-precision creation time whose id is not yet taken.
    pub fn next_stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut stamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        while self.get(&stamp.timestamp_millis().to_string()).is_some() {
            stamp += Duration::milliseconds(1);
        }
        stamp
    }

    /// Inserts at the front, evicting from the tail past capacity.
    pub fn add(&mut self, record: HistoryRecord) {
        self.records.insert(0, record);
        if self.records.len() > MAX_HISTORY {
            let evicted = self.records.len() - MAX_HISTORY;
            self.records.truncate(MAX_HISTORY);
            info!("🗑️ Evicted {} oldest history record(s)", evicted);
        }
        self.persist();
    }

    /// Removes the record with `id`; returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.persist();
    }

    // Best effort: a failed write leaves the in-memory cache authoritative.
    fn persist(&self) {
        let serialized = match serde_json::to_string(&self.records) {
            Ok(s) => s,
            Err(e) => {
                warn!("History serialization failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(&serialized) {
            warn!("History save failed: {}", e);
        }
    }
}
