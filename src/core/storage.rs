// Use traits so users can swap browser-like, file and memory stores freely.

use std::fmt;

use crate::core::error::BackendError;

/// Category of the store backing a façade, reported for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    InMemory,
    SessionStorage,
    LocalStorage,
    /// A caller-supplied store
    Custom,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::InMemory => "InMemory",
            StorageKind::SessionStorage => "SessionStorage",
            StorageKind::LocalStorage => "LocalStorage",
            StorageKind::Custom => "Custom",
        }
    }

    /// Parse one of the kinds that can be requested by name.
    ///
    /// `Custom` is not nameable: custom stores are passed as instances.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "InMemory" => Some(StorageKind::InMemory),
            "SessionStorage" => Some(StorageKind::SessionStorage),
            "LocalStorage" => Some(StorageKind::LocalStorage),
            _ => None,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous string key/value medium.
///
/// Stores are shared behind `Arc`, so every method takes `&self` and
/// implementations use interior mutability. Writes may fail; reads may not.
pub trait Store: Send + Sync {
    /// Read the raw string stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), BackendError>;

    /// Remove every key in the medium, regardless of namespace.
    fn clear(&self) -> Result<(), BackendError>;

    /// Number of stored keys.
    fn count(&self) -> usize;

    /// Key at position `index`, in the store's own key order.
    fn key_at(&self, index: usize) -> Option<String>;

    fn kind(&self) -> StorageKind {
        StorageKind::Custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_kinds_round_trip_through_names() {
        for kind in [
            StorageKind::InMemory,
            StorageKind::SessionStorage,
            StorageKind::LocalStorage,
        ] {
            assert_eq!(StorageKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn custom_and_unknown_names_are_rejected() {
        assert_eq!(StorageKind::from_name("Custom"), None);
        assert_eq!(StorageKind::from_name("localstorage"), None);
        assert_eq!(StorageKind::from_name(""), None);
    }
}
