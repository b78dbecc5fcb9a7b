//! Saved items store
//!
//! A JSON file in the data folder maps item keys to saved items. A missing or
//! unreadable file is not an error: the store starts empty and remembers a
//! warning for the user.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dpr_common::TaggedItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Saved items file errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// An item saved by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    pub item: TaggedItem,
    pub saved_at: DateTime<Utc>,
}

/// File-backed key -> item map
#[derive(Debug)]
pub struct SavedItemStore {
    path: PathBuf,
    items: BTreeMap<String, SavedItem>,
    load_warning: Option<String>,
}

impl SavedItemStore {
    /// Open the store at `path`
    ///
    /// A corrupt file is reset to an empty store on the next write.
    pub fn open(path: &Path) -> Self {
        let (items, load_warning) = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, SavedItem>>(&content) {
                Ok(items) => {
                    info!(count = items.len(), "Loaded saved items from {}", path.display());
                    (items, None)
                }
                Err(e) => {
                    warn!("Saved items file {} is corrupt: {}", path.display(), e);
                    (BTreeMap::new(), Some("Error while retrieving saved patterns.".to_string()))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (BTreeMap::new(), None),
            Err(e) => {
                warn!("Cannot read saved items file {}: {}", path.display(), e);
                (BTreeMap::new(), Some("Error while retrieving saved patterns.".to_string()))
            }
        };

        Self {
            path: path.to_path_buf(),
            items,
            load_warning,
        }
    }

    /// Warning from opening the store, if it could not be read
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SavedItem> {
        self.items.get(key)
    }

    /// Saved items ordered by key
    pub fn list(&self) -> impl Iterator<Item = &SavedItem> {
        self.items.values()
    }

    /// Save (or replace) an item and persist the store
    ///
    /// The in-memory map only changes once the file is written.
    pub fn save(&mut self, item: TaggedItem) -> Result<&SavedItem> {
        let key = item.key.clone();
        let mut items = self.items.clone();
        items.insert(
            key.clone(),
            SavedItem {
                item,
                saved_at: Utc::now(),
            },
        );
        self.commit(items)?;
        Ok(&self.items[&key])
    }

    /// Remove an item; returns whether it was present
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        if !self.items.contains_key(key) {
            return Ok(false);
        }
        let mut items = self.items.clone();
        items.remove(key);
        self.commit(items)?;
        Ok(true)
    }

    fn commit(&mut self, items: BTreeMap<String, SavedItem>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        self.items = items;
        self.load_warning = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_starts_empty_without_warning() {
        let dir = tempfile::tempdir().unwrap();
        let store = SavedItemStore::open(&dir.path().join("saved.json"));
        assert!(store.is_empty());
        assert!(store.load_warning().is_none());
    }

    #[test]
    fn test_save_remove_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");

        let mut store = SavedItemStore::open(&path);
        store.save(TaggedItem::new("k1", "Consent", &["A"])).unwrap();
        store.save(TaggedItem::new("k2", "Vault", &["B"])).unwrap();
        assert!(store.remove("k1").unwrap());
        assert!(!store.remove("k1").unwrap());

        let reopened = SavedItemStore::open(&path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("k2").unwrap().item.label, "Vault");
    }

    #[test]
    fn test_corrupt_file_is_reported_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut store = SavedItemStore::open(&path);
        assert!(store.is_empty());
        assert!(store.load_warning().is_some());

        store.save(TaggedItem::new("k1", "Consent", &[])).unwrap();
        assert!(store.load_warning().is_none());
        assert_eq!(SavedItemStore::open(&path).len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_items_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.json");
        let mut store = SavedItemStore::open(&path);
        store.save(TaggedItem::new("k1", "Consent", &[])).unwrap();

        // A directory where the temp file goes makes every write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(store.save(TaggedItem::new("k2", "Vault", &[])).is_err());
        assert!(store.get("k2").is_none());
        assert_eq!(store.len(), 1);

        assert!(store.remove("k1").is_err());
        assert!(store.get("k1").is_some());
        assert_eq!(SavedItemStore::open(&path).len(), 1);
    }

    #[test]
    fn test_unwritable_folder_keeps_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut store = SavedItemStore::open(&blocker.join("saved.json"));
        assert!(store.save(TaggedItem::new("k1", "Consent", &[])).is_err());
        assert!(store.is_empty());
    }
}
