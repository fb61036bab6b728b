// Convenience re-exports: use stowage::prelude::*;
pub use crate::core::{
    Backends, NamespacedStorage, StorageError, StorageKind, StorageOptions, StorageType, Store,
};

pub use serde_json::{Value, json};
