//! Key-value store seam for the key-value benchmark adapter
//!
//! [`KvStore`] is the operation surface the adapter benchmarks against;
//! [`KvProvider`] is the connection seam the orchestration layer injects
//! (acquire a session, health-check the backend). The in-memory
//! implementation backs tests and the reference wiring.
//!
//! # Example
//!
//! ```rust,no_run
//! use optibench::kv::{KvStore, MemoryKvStore};
//!
//! # async fn example() -> optibench::Result<()> {
//! let store = MemoryKvStore::new();
//! store.set("key", b"value".to_vec()).await?;
//! let value = store.get("key").await?;
//! assert_eq!(value, Some(b"value".to_vec()));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::Result;

/// Key-value operation surface benchmarked by the key-value adapter.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value for a key, overwriting any existing value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete a key. No-op if the key doesn't exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`.
    ///
    /// Used for idempotent scratch reset; must tolerate an empty store.
    async fn purge_prefix(&self, prefix: &str) -> Result<()>;
}

/// Connection seam for key-value backends.
#[async_trait]
pub trait KvProvider: Send + Sync {
    /// Acquire a usable store handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BackendUnavailable`] when no session can be
    /// supplied.
    async fn acquire(&self) -> Result<Arc<dyn KvStore>>;

    /// Cheap liveness probe for the backend.
    async fn health_check(&self) -> bool;
}

/// In-memory key-value store using a lock-free concurrent hashmap.
///
/// Thread-safe; data is lost on drop. This is the reference backend for the
/// key-value benchmark adapter.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    store: DashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    /// Create a new in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains_key(key))
    }

    async fn purge_prefix(&self, prefix: &str) -> Result<()> {
        self.store.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Provider handing out a shared in-memory store.
#[derive(Debug, Default)]
pub struct MemoryKvProvider {
    store: Arc<MemoryKvStore>,
}

impl MemoryKvProvider {
    /// Create a provider over a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider over an existing store.
    #[must_use]
    pub fn with_store(store: Arc<MemoryKvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KvProvider for MemoryKvProvider {
    async fn acquire(&self) -> Result<Arc<dyn KvStore>> {
        Ok(Arc::clone(&self.store) as Arc<dyn KvStore>)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
