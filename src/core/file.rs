//! Persistent store backed by a single JSON file.
//!
//! The whole map is rewritten on every mutation (write to a sibling `.tmp`
//! file, then rename). Intended for small settings-sized data sets, the same
//! scale a browser's local storage serves.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::core::error::BackendError;
use crate::core::storage::{StorageKind, Store};

pub struct FileStore {
    path: PathBuf,
    kind: StorageKind,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents if the file exists.
    ///
    /// A missing or empty file starts an empty store; nothing is written until
    /// the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let entries: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened file store {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            kind: StorageKind::LocalStorage,
            entries: Mutex::new(entries),
        })
    }

    /// Override the reported kind (defaults to `LocalStorage`).
    pub fn with_kind(mut self, kind: StorageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling scratch file: the full file name plus `.tmp`, so stores that
    /// differ only by extension never share one.
    fn scratch_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.scratch_path();
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `mutate` and persist; the in-memory map is rolled back if the
    /// write to disk fails.
    fn mutate<F>(&self, mutate: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock();
        let previous = entries.clone();
        mutate(&mut *entries);

        if let Err(e) = self.persist(&entries) {
            *entries = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.mutate(BTreeMap::clear)
    }

    fn count(&self) -> usize {
        self.entries.lock().len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.entries.lock().keys().nth(index).cloned()
    }

    fn kind(&self) -> StorageKind {
        self.kind
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("keys", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_opens_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("store.json")).unwrap();
        assert_eq!(store.count(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn contents_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("app:theme", "\"dark\"").unwrap();
        store.set("app:volume", "7").unwrap();
        store.remove("app:volume").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("app:theme").as_deref(), Some("\"dark\""));
        assert_eq!(reopened.get("app:volume"), None);
        assert_eq!(reopened.count(), 1);
    }

    #[test]
    fn clear_is_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.clear().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 0);
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        let path = dir.join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("kept", "0").unwrap();

        // Replace the parent directory with a regular file so persisting fails.
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, "not a directory").unwrap();

        let err = store.set("a", "1").unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("kept").as_deref(), Some("0"));
        assert_eq!(store.count(), 1);

        let err = store.remove("kept").unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
        assert_eq!(store.get("kept").as_deref(), Some("0"));
    }

    #[test]
    fn stores_differing_by_extension_persist_independently() {
        let tmp = TempDir::new().unwrap();
        let json = FileStore::open(tmp.path().join("settings.json")).unwrap();
        let toml = FileStore::open(tmp.path().join("settings.toml")).unwrap();

        json.set("format", "\"json\"").unwrap();
        toml.set("format", "\"toml\"").unwrap();

        assert!(!tmp.path().join("settings.tmp").exists());
        assert!(!tmp.path().join("settings.json.tmp").exists());

        let json = FileStore::open(tmp.path().join("settings.json")).unwrap();
        let toml = FileStore::open(tmp.path().join("settings.toml")).unwrap();
        assert_eq!(json.get("format").as_deref(), Some("\"json\""));
        assert_eq!(toml.get("format").as_deref(), Some("\"toml\""));
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, BackendError::Encoding(_)));
    }

    #[test]
    fn kind_can_be_overridden() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("s.json"))
            .unwrap()
            .with_kind(StorageKind::SessionStorage);
        assert_eq!(store.kind(), StorageKind::SessionStorage);
    }
}
