//! Stowage
//!
//! Namespaced JSON key/value storage over pluggable synchronous stores, with
//! multi-key batches and per-key change watchers.
//!
//! A [`NamespacedStorage`] resolves its backend once, at construction: a named
//! kind (`"InMemory"`, `"SessionStorage"`, `"LocalStorage"`) or a custom
//! [`Store`]. Platform stores that are missing or fail the support check are
//! replaced by the in-memory store shared by the whole [`Backends`]
//! environment.

#![forbid(unsafe_code)]

pub mod core;
pub mod prelude;

pub use crate::core::{
    Backends, BackendError, ConfigStore, Configurable, Entries, FileStore, InMemoryStore, Keys,
    Lookup, NamespacedStorage, Result, StorageConfig, StorageError, StorageKind, StorageOptions,
    StorageType, Store,
};
