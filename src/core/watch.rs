//! Watcher bookkeeping for the namespaced façade.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Boxed watcher callback, invoked with `(old_value, new_value)`.
pub type Watcher = Box<dyn FnMut(&Value, &Value) -> anyhow::Result<()> + Send>;

/// Ordered watcher lists keyed by logical key.
///
/// Keys keep the order in which they first received a watcher, and each
/// key's watchers keep registration order. A key only appears once it has at
/// least one watcher.
#[derive(Default)]
pub struct WatcherRegistry {
    slots: HashMap<String, usize>,
    lists: Vec<(String, Vec<Watcher>)>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str, watcher: Watcher) {
        match self.slots.get(key) {
            Some(&slot) => self.lists[slot].1.push(watcher),
            None => {
                self.slots.insert(key.to_string(), self.lists.len());
                self.lists.push((key.to_string(), vec![watcher]));
            }
        }
    }

    /// Watched keys, in first-registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lists.iter().map(|(key, _)| key.as_str())
    }

    /// Number of watchers registered for `key`.
    pub fn count(&self, key: &str) -> usize {
        self.slots
            .get(key)
            .map_or(0, |&slot| self.lists[slot].1.len())
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Invoke every watcher of `key` in registration order.
    ///
    /// Stops at the first failing watcher; later watchers are not called.
    pub fn notify(&mut self, key: &str, old: &Value, new: &Value) -> anyhow::Result<()> {
        let Some(&slot) = self.slots.get(key) else {
            return Ok(());
        };

        for watcher in self.lists[slot].1.iter_mut() {
            watcher(old, new)?;
        }
        Ok(())
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.lists.iter().map(|(key, list)| (key, list.len())))
            .finish()
    }
}
