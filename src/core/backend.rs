//! Backend selection.
//!
//! Maps a requested [`StorageType`] onto a working [`Store`]. Platform stores
//! ("LocalStorage", "SessionStorage") are injected into a [`Backends`]
//! environment rather than looked up from ambient globals, so selection can be
//! exercised with fake stores.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stowage::core::{Backends, FileStore, StorageType};
//!
//! let backends = Backends::new()
//!     .with_local_storage(Arc::new(FileStore::open("settings.json")?));
//! let store = backends.resolve(&StorageType::from("LocalStorage"))?;
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::error::{BackendError, Result, StorageError};
use crate::core::memory::InMemoryStore;
use crate::core::storage::{StorageKind, Store};

/// Key written (and removed again) by the support check.
pub const SUPPORT_CHECK_KEY: &str = "localStorage";
/// Value written by the support check.
pub const SUPPORT_CHECK_VALUE: &str = "test";

/// Requested backend: a named kind or a caller-supplied store.
#[derive(Clone)]
pub enum StorageType {
    Named(String),
    Custom(Arc<dyn Store>),
}

impl StorageType {
    pub fn custom(store: impl Store + 'static) -> Self {
        StorageType::Custom(Arc::new(store))
    }
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::Named(StorageKind::LocalStorage.as_str().to_string())
    }
}

impl From<&str> for StorageType {
    fn from(name: &str) -> Self {
        StorageType::Named(name.to_string())
    }
}

impl From<String> for StorageType {
    fn from(name: String) -> Self {
        StorageType::Named(name)
    }
}

impl From<StorageKind> for StorageType {
    fn from(kind: StorageKind) -> Self {
        StorageType::Named(kind.as_str().to_string())
    }
}

impl From<Arc<dyn Store>> for StorageType {
    fn from(store: Arc<dyn Store>) -> Self {
        StorageType::Custom(store)
    }
}

impl fmt::Debug for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Named(name) => f.debug_tuple("Named").field(name).finish(),
            StorageType::Custom(store) => f.debug_tuple("Custom").field(&store.kind()).finish(),
        }
    }
}

/// Check whether `store` is usable by writing and then removing a canary key.
///
/// The remove is attempted even when the write fails or panics, so a partial
/// write leaves nothing behind. Errors and panics both count as unsupported.
pub fn is_supported(store: &dyn Store) -> bool {
    let written = check_step(store, "write", || {
        store.set(SUPPORT_CHECK_KEY, SUPPORT_CHECK_VALUE)
    });
    let removed = check_step(store, "remove", || store.remove(SUPPORT_CHECK_KEY));
    written && removed
}

fn check_step<F>(store: &dyn Store, step: &str, op: F) -> bool
where
    F: FnOnce() -> Result<(), BackendError>,
{
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Storage support check {} failed for {} store: {}", step, store.kind(), e);
            false
        }
        Err(_) => {
            warn!("Storage support check {} panicked for {} store", step, store.kind());
            false
        }
    }
}

/// Storage environment: the platform stores available to this process and
/// the in-memory store every fallback shares.
pub struct Backends {
    memory: Arc<InMemoryStore>,
    local: RwLock<Option<Arc<dyn Store>>>,
    session: RwLock<Option<Arc<dyn Store>>>,
}

impl Default for Backends {
    fn default() -> Self {
        Self::new()
    }
}

impl Backends {
    /// Create an environment with no platform stores and a fresh in-memory
    /// fallback.
    pub fn new() -> Self {
        Self {
            memory: Arc::new(InMemoryStore::new()),
            local: RwLock::new(None),
            session: RwLock::new(None),
        }
    }

    pub fn with_local_storage(self, store: Arc<dyn Store>) -> Self {
        self.set_local_storage(Some(store));
        self
    }

    pub fn with_session_storage(self, store: Arc<dyn Store>) -> Self {
        self.set_session_storage(Some(store));
        self
    }

    /// Install (or remove) the "LocalStorage" platform store.
    ///
    /// Already constructed façades keep the store they resolved.
    pub fn set_local_storage(&self, store: Option<Arc<dyn Store>>) {
        *self.local.write() = store;
    }

    /// Install (or remove) the "SessionStorage" platform store.
    pub fn set_session_storage(&self, store: Option<Arc<dyn Store>>) {
        *self.session.write() = store;
    }

    /// The in-memory store shared by every fallback in this environment.
    pub fn memory(&self) -> Arc<InMemoryStore> {
        self.memory.clone()
    }

    /// Resolve a requested storage type into a working store.
    ///
    /// Only an unrecognized name fails; unusable stores degrade to the shared
    /// in-memory store.
    pub fn resolve(&self, requested: &StorageType) -> Result<Arc<dyn Store>> {
        match requested {
            StorageType::Named(name) => match StorageKind::from_name(name) {
                Some(StorageKind::InMemory) => Ok(self.fallback()),
                Some(StorageKind::LocalStorage) => {
                    let candidate = self.local.read().clone();
                    Ok(self.supported_or_fallback(candidate, StorageKind::LocalStorage))
                }
                Some(StorageKind::SessionStorage) => {
                    let candidate = self.session.read().clone();
                    Ok(self.supported_or_fallback(candidate, StorageKind::SessionStorage))
                }
                Some(StorageKind::Custom) | None => {
                    Err(StorageError::UnsupportedConfiguration(name.clone()))
                }
            },
            StorageType::Custom(store) => {
                Ok(self.supported_or_fallback(Some(store.clone()), StorageKind::Custom))
            }
        }
    }

    fn fallback(&self) -> Arc<dyn Store> {
        self.memory.clone()
    }

    fn supported_or_fallback(
        &self,
        candidate: Option<Arc<dyn Store>>,
        requested: StorageKind,
    ) -> Arc<dyn Store> {
        match candidate {
            Some(store) if is_supported(store.as_ref()) => {
                debug!("Using {} store for {} request", store.kind(), requested);
                store
            }
            Some(_) => {
                warn!("{} store is not usable, falling back to memory", requested);
                self.fallback()
            }
            None => {
                debug!("No {} store installed, falling back to memory", requested);
                self.fallback()
            }
        }
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("memory_keys", &self.memory.len())
            .field("local", &self.local.read().is_some())
            .field("session", &self.session.read().is_some())
            .finish()
    }
}

/// Process-wide default environment
static GLOBAL: Lazy<Backends> = Lazy::new(Backends::new);

impl Backends {
    /// Get the process-wide default environment.
    ///
    /// Every façade built without an explicit environment resolves through
    /// this one, so all of their fallbacks share a single in-memory store.
    pub fn global() -> &'static Backends {
        &GLOBAL
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Store whose writes are refused, like storage disabled by the platform.
    struct RefusingStore {
        removes: AtomicUsize,
    }

    impl RefusingStore {
        fn new() -> Self {
            Self {
                removes: AtomicUsize::new(0),
            }
        }
    }

    impl Store for RefusingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), BackendError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn clear(&self) -> Result<(), BackendError> {
            Ok(())
        }
        fn count(&self) -> usize {
            0
        }
        fn key_at(&self, _index: usize) -> Option<String> {
            None
        }
    }

    struct PanickingStore;

    impl Store for PanickingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), BackendError> {
            panic!("storage access denied")
        }
        fn remove(&self, _key: &str) -> Result<(), BackendError> {
            panic!("storage access denied")
        }
        fn clear(&self) -> Result<(), BackendError> {
            Ok(())
        }
        fn count(&self) -> usize {
            0
        }
        fn key_at(&self, _index: usize) -> Option<String> {
            None
        }
    }

    fn is_memory(backends: &Backends, store: &Arc<dyn Store>) -> bool {
        let memory: Arc<dyn Store> = backends.memory();
        Arc::ptr_eq(&memory, store) && store.kind() == StorageKind::InMemory
    }

    #[test]
    fn in_memory_resolves_to_shared_store() {
        let backends = Backends::new();
        let a = backends.resolve(&"InMemory".into()).unwrap();
        let b = backends.resolve(&"InMemory".into()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(is_memory(&backends, &a));
    }

    #[test]
    fn missing_platform_store_falls_back() {
        let backends = Backends::new();
        let local = backends.resolve(&StorageType::default()).unwrap();
        let session = backends.resolve(&"SessionStorage".into()).unwrap();
        assert!(is_memory(&backends, &local));
        assert!(is_memory(&backends, &session));
    }

    #[test]
    fn supported_platform_store_is_used() {
        let platform: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let backends = Backends::new().with_session_storage(platform.clone());

        let resolved = backends.resolve(&"SessionStorage".into()).unwrap();
        assert!(Arc::ptr_eq(&resolved, &platform));
        // the support check cleans up after itself
        assert_eq!(platform.count(), 0);
    }

    #[test]
    fn unsupported_platform_store_falls_back() {
        let backends = Backends::new().with_local_storage(Arc::new(RefusingStore::new()));
        let resolved = backends.resolve(&"LocalStorage".into()).unwrap();
        assert!(is_memory(&backends, &resolved));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let backends = Backends::new();
        let err = backends.resolve(&"IndexedDb".into()).err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedConfiguration(name) if name == "IndexedDb"));

        let err = backends.resolve(&"Custom".into()).err().unwrap();
        assert!(matches!(err, StorageError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn custom_store_is_checked_not_rejected() {
        let backends = Backends::new();

        let good: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let resolved = backends.resolve(&good.clone().into()).unwrap();
        assert!(Arc::ptr_eq(&resolved, &good));

        let resolved = backends
            .resolve(&StorageType::custom(RefusingStore::new()))
            .unwrap();
        assert!(is_memory(&backends, &resolved));
    }

    #[test]
    fn support_check_removes_even_when_write_fails() {
        let store = RefusingStore::new();
        assert!(!is_supported(&store));
        assert_eq!(store.removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn support_check_treats_panics_as_unsupported() {
        assert!(!is_supported(&PanickingStore));

        let backends = Backends::new();
        let resolved = backends
            .resolve(&StorageType::custom(PanickingStore))
            .unwrap();
        assert!(is_memory(&backends, &resolved));
    }

    /// Store that records the write, then panics before returning.
    struct WriteThenPanic(InMemoryStore);

    impl Store for WriteThenPanic {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
            self.0.set(key, value)?;
            panic!("storage quota callback failed")
        }
        fn remove(&self, key: &str) -> Result<(), BackendError> {
            self.0.remove(key)
        }
        fn clear(&self) -> Result<(), BackendError> {
            self.0.clear()
        }
        fn count(&self) -> usize {
            self.0.count()
        }
        fn key_at(&self, index: usize) -> Option<String> {
            self.0.key_at(index)
        }
    }

    #[test]
    fn support_check_cleans_up_after_write_that_panics() {
        let store = WriteThenPanic(InMemoryStore::new());
        assert!(!is_supported(&store));
        assert_eq!(store.count(), 0);
        assert_eq!(store.get(SUPPORT_CHECK_KEY), None);
    }

    #[test]
    fn environments_do_not_share_fallbacks() {
        let a = Backends::new();
        let b = Backends::new();
        let from_a = a.resolve(&"InMemory".into()).unwrap();
        let from_b = b.resolve(&"InMemory".into()).unwrap();
        assert!(!Arc::ptr_eq(&from_a, &from_b));
    }

    #[test]
    fn platform_slot_can_be_replaced() {
        let backends = Backends::new();
        let platform: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        backends.set_local_storage(Some(platform.clone()));
        assert!(Arc::ptr_eq(&backends.resolve(&"LocalStorage".into()).unwrap(), &platform));

        backends.set_local_storage(None);
        let resolved = backends.resolve(&"LocalStorage".into()).unwrap();
        assert!(is_memory(&backends, &resolved));
    }
}
