use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::core::error::BackendError;
use crate::core::storage::{StorageKind, Store};

/// In-memory store used as the fallback backend.
///
/// One instance is shared (via `Arc`) by every façade that falls back within
/// the same [`Backends`](crate::core::backend::Backends) environment, so the
/// only isolation between those façades is their namespace.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of every physical key and raw value, in key order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Store for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn count(&self) -> usize {
        self.len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.entries.lock().keys().nth(index).cloned()
    }

    fn kind(&self) -> StorageKind {
        StorageKind::InMemory
    }
}
