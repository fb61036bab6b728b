//! Namespaced, JSON-aware storage with synchronous change watchers.
//!
//! Every logical key is stored under the physical key `"{namespace}:{key}"`.
//! Values are serialized to JSON on write and parsed on read; an absent key
//! reads as `null`.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use stowage::prelude::*;
//!
//! let mut prefs = NamespacedStorage::new(StorageOptions::new().namespace("prefs"))?;
//! prefs.watch("theme", |old, new| println!("theme: {old} -> {new}"));
//! prefs.set_one("theme", "dark")?;
//! prefs.set(vec![("volume", json!(7)), ("muted", json!(false))], None)?;
//! assert_eq!(prefs.get_one("theme")?, json!("dark"));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::backend::{Backends, StorageType};
use crate::core::error::{Result, StorageError};
use crate::core::storage::{StorageKind, Store};
use crate::core::watch::WatcherRegistry;

// ============================================================================
// Options
// ============================================================================

/// Construction options for a [`NamespacedStorage`].
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Prefix isolating this façade's keys (default `""`)
    pub namespace: String,
    /// Requested backend (default `"LocalStorage"`)
    pub storage_type: StorageType,
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn storage_type(mut self, storage_type: impl Into<StorageType>) -> Self {
        self.storage_type = storage_type.into();
        self
    }
}

// ============================================================================
// Call shapes
// ============================================================================

/// Key argument of `get` and `remove`: one logical key or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keys {
    One(String),
    Many(Vec<String>),
}

impl Keys {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Keys::One(key) => vec![key],
            Keys::Many(keys) => keys,
        }
    }
}

impl From<&str> for Keys {
    fn from(key: &str) -> Self {
        Keys::One(key.to_string())
    }
}

impl From<String> for Keys {
    fn from(key: String) -> Self {
        Keys::One(key)
    }
}

impl From<&String> for Keys {
    fn from(key: &String) -> Self {
        Keys::One(key.clone())
    }
}

impl From<Vec<String>> for Keys {
    fn from(keys: Vec<String>) -> Self {
        Keys::Many(keys)
    }
}

impl From<Vec<&str>> for Keys {
    fn from(keys: Vec<&str>) -> Self {
        Keys::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Keys {
    fn from(keys: &[&str]) -> Self {
        Keys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Keys {
    fn from(keys: [&str; N]) -> Self {
        Keys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

/// Result of `get`, shaped like the key argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    One(Value),
    Many(Vec<Value>),
}

impl Lookup {
    /// The single value, or `None` if this was a multi-key lookup.
    pub fn into_one(self) -> Option<Value> {
        match self {
            Lookup::One(value) => Some(value),
            Lookup::Many(_) => None,
        }
    }

    /// All values in key order; a single lookup yields one element.
    pub fn into_many(self) -> Vec<Value> {
        match self {
            Lookup::One(value) => vec![value],
            Lookup::Many(values) => values,
        }
    }
}

/// Key argument of `set`: one logical key, or ordered `(key, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Entries {
    One(String),
    Pairs(Vec<(String, Value)>),
}

impl From<&str> for Entries {
    fn from(key: &str) -> Self {
        Entries::One(key.to_string())
    }
}

impl From<String> for Entries {
    fn from(key: String) -> Self {
        Entries::One(key)
    }
}

impl<K, V> From<Vec<(K, V)>> for Entries
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Entries::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Entries
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Entries::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// Façade
// ============================================================================

/// Namespaced key/value storage over a [`Store`], with per-key watchers.
///
/// Watchers run inline, inside the `set`/`remove`/`clear` call that caused
/// the transition. A failing watcher aborts that call, including any keys of
/// a batch that were not processed yet.
pub struct NamespacedStorage {
    namespace: String,
    store: Arc<dyn Store>,
    watchers: WatcherRegistry,
}

impl NamespacedStorage {
    /// Create a façade resolving its backend through [`Backends::global`].
    pub fn new(options: StorageOptions) -> Result<Self> {
        Self::with_backends(options, Backends::global())
    }

    /// Create a façade resolving its backend through `backends`.
    ///
    /// Fails only for an unrecognized named storage type.
    pub fn with_backends(options: StorageOptions, backends: &Backends) -> Result<Self> {
        let store = backends.resolve(&options.storage_type)?;

        info!(
            "Storage ready: namespace {:?} on {} store",
            options.namespace,
            store.kind()
        );

        Ok(Self {
            namespace: options.namespace,
            store,
            watchers: WatcherRegistry::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Which category of store backs this instance.
    pub fn storage_type(&self) -> StorageKind {
        self.store.kind()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read one key or an ordered list of keys.
    ///
    /// Lists are looked up entry by entry; duplicates are preserved.
    pub fn get(&self, keys: impl Into<Keys>) -> Result<Lookup> {
        match keys.into() {
            Keys::One(key) => self.get_one(&key).map(Lookup::One),
            Keys::Many(keys) => self.get_many(&keys).map(Lookup::Many),
        }
    }

    /// Read one key; absent keys read as `Value::Null`.
    pub fn get_one(&self, key: &str) -> Result<Value> {
        match self.store.get(&self.physical_key(key)) {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Value::Null),
        }
    }

    pub fn get_many<I, K>(&self, keys: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter().map(|k| self.get_one(k.as_ref())).collect()
    }

    /// Read one key into a typed value; absent (or `null`) reads as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_one(key)? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write one key, or a list of `(key, value)` pairs in order.
    ///
    /// With a single key, `data` is the value (`None` writes `null`). With a
    /// pair list, `data` must be `None`; otherwise the call fails with
    /// [`StorageError::InvalidArgument`] before anything is written.
    pub fn set(&mut self, entries: impl Into<Entries>, data: Option<Value>) -> Result<()> {
        match entries.into() {
            Entries::One(key) => self.write(&key, data.unwrap_or(Value::Null)),
            Entries::Pairs(_) if data.is_some() => Err(StorageError::InvalidArgument(
                "cannot set both a key sequence and a single data value",
            )),
            Entries::Pairs(pairs) => {
                for (key, value) in pairs {
                    self.write(&key, value)?;
                }
                Ok(())
            }
        }
    }

    /// Serialize `data` and write it under `key`.
    pub fn set_one<T: Serialize + ?Sized>(&mut self, key: &str, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.write(key, value)
    }

    /// Write serializable pairs in order, notifying after each write.
    pub fn set_many<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        for (key, data) in pairs {
            let value = serde_json::to_value(&data)?;
            self.write(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Remove one key or an ordered list of keys.
    ///
    /// Absent keys are not an error; their watchers still see `(null, null)`.
    pub fn remove(&mut self, keys: impl Into<Keys>) -> Result<()> {
        for key in keys.into().into_vec() {
            self.remove_one(&key)?;
        }
        Ok(())
    }

    pub fn remove_one(&mut self, key: &str) -> Result<()> {
        let before = self.get_one(key)?;
        self.store.remove(&self.physical_key(key))?;
        debug!("Removed {}:{}", self.namespace, key);
        self.notify(key, &before, &Value::Null)
    }

    /// Clear the whole backing store, then notify watched keys.
    ///
    /// This wipes every namespace sharing the store, not only this one. Only
    /// keys with watchers are snapshotted and notified, in the order they
    /// were first watched.
    pub fn clear(&mut self) -> Result<()> {
        let mut snapshot = Vec::new();
        for key in self.watchers.keys() {
            snapshot.push((key.to_string(), self.get_one(key)?));
        }

        self.store.clear()?;
        debug!(
            "Cleared {} store from namespace {:?}, notifying {} watched keys",
            self.store.kind(),
            self.namespace,
            snapshot.len()
        );

        for (key, before) in snapshot {
            self.notify(&key, &before, &Value::Null)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Call `callback(old, new)` on every future transition of `key` made
    /// through this instance. Watchers cannot be removed.
    pub fn watch<F>(&mut self, key: &str, mut callback: F) -> &mut Self
    where
        F: FnMut(&Value, &Value) + Send + 'static,
    {
        self.try_watch(key, move |old: &Value, new: &Value| {
            callback(old, new);
            Ok(())
        })
    }

    /// Like [`watch`](Self::watch), but the callback may fail.
    ///
    /// An error aborts the triggering operation with
    /// [`StorageError::Watcher`].
    pub fn try_watch<F>(&mut self, key: &str, callback: F) -> &mut Self
    where
        F: FnMut(&Value, &Value) -> anyhow::Result<()> + Send + 'static,
    {
        self.watchers.register(key, Box::new(callback));
        self
    }

    /// Watched keys, in the order they were first watched.
    pub fn watched_keys(&self) -> Vec<&str> {
        self.watchers.keys().collect()
    }

    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.count(key)
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn physical_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn write(&mut self, key: &str, value: Value) -> Result<()> {
        let before = self.get_one(key)?;
        let encoded = serde_json::to_string(&value)?;
        self.store.set(&self.physical_key(key), &encoded)?;
        debug!("Wrote {}:{}", self.namespace, key);
        self.notify(key, &before, &value)
    }

    fn notify(&mut self, key: &str, old: &Value, new: &Value) -> Result<()> {
        self.watchers
            .notify(key, old, new)
            .map_err(StorageError::Watcher)
    }
}

impl fmt::Debug for NamespacedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespacedStorage")
            .field("namespace", &self.namespace)
            .field("storage_type", &self.store.kind())
            .field("watchers", &self.watchers)
            .finish()
    }
}
