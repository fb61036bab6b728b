pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod file;
pub mod memory;
pub mod storage;
pub mod watch;

pub use backend::{Backends, StorageType, is_supported};
pub use config::{ConfigStore, Configurable, StorageConfig};
pub use error::{BackendError, Result, StorageError};
pub use facade::{Entries, Keys, Lookup, NamespacedStorage, StorageOptions};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use storage::{StorageKind, Store};
pub use watch::{Watcher, WatcherRegistry};
