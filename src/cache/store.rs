//! Durable Store Port
//!
//! String key/value storage that backs the persistent tier. Implementations
//! must report keys in write order; overwriting a key keeps its position.
//!
//! # Implementations
//!
//! - [`InMemoryStore`]: process-local, with quota and outage switches for
//!   exercising the failure paths
//! - [`FileStore`]: JSON file on local disk, survives process restart

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Durable key/value store
pub trait DurableStore: Send + Sync {
    /// Read a raw value
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value (absent keys are not an error)
    fn remove_item(&self, key: &str) -> Result<()>;

    /// All keys, oldest write first
    fn keys(&self) -> Result<Vec<String>>;
}

/// One stored key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredItem {
    key: String,
    value: String,
}

/// Write-ordered item list shared by both implementations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct OrderedItems(Vec<StoredItem>);

impl OrderedItems {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }

    fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|item| item.key == key)
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|item| item.key == key) {
            Some(item) => item.value = value.to_string(),
            None => self.0.push(StoredItem {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|item| item.key != key);
        self.0.len() != before
    }

    fn keys(&self) -> Vec<String> {
        self.0.iter().map(|item| item.key.clone()).collect()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory durable store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<OrderedItems>,
    /// Maximum number of items before writes of new keys fail
    quota: Option<usize>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects new keys once `max_items` are held
    pub fn with_quota(max_items: usize) -> Self {
        Self {
            quota: Some(max_items),
            ..Self::default()
        }
    }

    /// Simulate the store becoming (un)available
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::StorageUnavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl DurableStore for InMemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.items.lock().get(key).map(str::to_string))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        let mut items = self.items.lock();
        if let Some(quota) = self.quota {
            if !items.contains(key) && items.len() >= quota {
                return Err(Error::StorageUnavailable(format!(
                    "quota of {} items exceeded",
                    quota
                )));
            }
        }
        items.set(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.items.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.items.lock().keys())
    }
}

// =============================================================================
// File store
// =============================================================================

/// JSON-file backed durable store
///
/// The whole item list is rewritten on every mutation (write to a sibling
/// temp file, then rename). The list is small, bounded by the persistent
/// tier's entry cap.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: Mutex<OrderedItems>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// A missing file starts empty. A corrupt file is logged and ignored;
    /// the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = Self::load(&path);
        debug!(path = %path.display(), items = items.len(), "Opened file store");
        Self {
            path,
            items: Mutex::new(items),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> OrderedItems {
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), "Store file is corrupt, starting empty: {}", e);
                    OrderedItems::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => OrderedItems::default(),
            Err(e) => {
                warn!(path = %path.display(), "Failed to read store file, starting empty: {}", e);
                OrderedItems::default()
            }
        }
    }

    fn persist(&self, items: &OrderedItems) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply a mutation and commit it only if the file write succeeds
    fn mutate(&self, apply: impl FnOnce(&mut OrderedItems)) -> Result<()> {
        let mut items = self.items.lock();
        let mut next = items.clone();
        apply(&mut next);
        self.persist(&next)
            .map_err(|e| Error::StorageUnavailable(format!("{}: {}", self.path.display(), e)))?;
        *items = next;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).map(str::to_string))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|items| items.set(key, value))
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if !self.items.lock().contains(key) {
            return Ok(());
        }
        self.mutate(|items| {
            items.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.lock().keys())
    }
}

// =============================================================================
// Tests
// =============================================================================
