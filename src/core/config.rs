//! Configuration for storage façades.
//!
//! Façade options can be built in code ([`StorageOptions`]) or read from the
//! `[storage]` section of a TOML file:
//!
//! ```toml
//! [storage]
//! namespace = "app"
//! storage_type = "SessionStorage"
//! ```
//!
//! Custom store instances cannot be expressed in TOML; pass them through
//! [`StorageOptions::storage_type`] instead.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::core::backend::{Backends, StorageType};
use crate::core::error::{Result, StorageError};
use crate::core::facade::{NamespacedStorage, StorageOptions};
use crate::core::storage::StorageKind;

// ============================================================================
// Configurable Trait
// ============================================================================

/// Trait for types that can be loaded from a configuration section
pub trait Configurable: DeserializeOwned + Default {
    /// TOML section name, e.g. `"storage"` for `[storage]`.
    const PREFIX: &'static str;
}

// ============================================================================
// Configuration Store
// ============================================================================

/// Parsed TOML configuration
pub struct ConfigStore {
    data: toml::Value,
    path: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigStore {
    pub fn empty() -> Self {
        Self {
            data: toml::Value::Table(Default::default()),
            path: None,
        }
    }

    /// Create a configuration store from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let data: toml::Value = toml::from_str(content)
            .map_err(|e| StorageError::Config(format!("failed to parse TOML: {}", e)))?;
        Ok(Self { data, path: None })
    }

    /// Create a configuration store from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading storage configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;

        let data: toml::Value = toml::from_str(&content).map_err(|e| {
            StorageError::Config(format!("failed to parse TOML in '{}': {}", path.display(), e))
        })?;

        Ok(Self {
            data,
            path: Some(path.to_path_buf()),
        })
    }

    /// Get a typed configuration section; a missing section yields defaults.
    pub fn get<C: Configurable>(&self) -> Result<C> {
        let section = self
            .data
            .get(C::PREFIX)
            .cloned()
            .unwrap_or(toml::Value::Table(Default::default()));

        debug!("Loading config section: {}", C::PREFIX);

        section.try_into().map_err(|e| {
            StorageError::Config(format!("invalid section '{}': {}", C::PREFIX, e))
        })
    }

    pub fn has_section(&self, prefix: &str) -> bool {
        self.data.get(prefix).is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Merge another configuration into this one; `other` wins on conflicts.
    pub fn merge(&mut self, other: &ConfigStore) {
        merge_toml_values(&mut self.data, &other.data);
    }
}

fn merge_toml_values(base: &mut toml::Value, other: &toml::Value) {
    match (base, other) {
        (toml::Value::Table(base_table), toml::Value::Table(other_table)) => {
            for (key, value) in other_table {
                match base_table.get_mut(key) {
                    Some(existing) => merge_toml_values(existing, value),
                    None => {
                        base_table.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, other) => *base = other.clone(),
    }
}

// ============================================================================
// Storage section
// ============================================================================

/// The `[storage]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub namespace: String,
    /// One of `"InMemory"`, `"SessionStorage"`, `"LocalStorage"`.
    pub storage_type: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            storage_type: StorageKind::LocalStorage.as_str().to_string(),
        }
    }
}

impl Configurable for StorageConfig {
    const PREFIX: &'static str = "storage";
}

impl StorageConfig {
    /// Convert into façade options. The storage type name is validated when
    /// the façade is constructed.
    pub fn into_options(self) -> StorageOptions {
        StorageOptions::new()
            .namespace(self.namespace)
            .storage_type(StorageType::Named(self.storage_type))
    }
}

impl NamespacedStorage {
    /// Build a façade from the `[storage]` section of `config`.
    pub fn from_config(config: &ConfigStore, backends: &Backends) -> Result<Self> {
        let section: StorageConfig = config.get()?;
        Self::with_backends(section.into_options(), backends)
    }
}
