// # Memory Cache Store
//
// In-memory implementation of CacheStore.
//
// ## Purpose
//
// Provides a fast cache that doesn't persist across restarts. Useful for
// testing and for one-shot runs where resuming is not wanted.
//
// ## Crash Behavior
//
// - All checkpoints are lost on restart/crash
// - A restarted probe run tests every entry again

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::cache_store::{CacheStore, validate_cache_name};

/// In-memory cache store implementation
///
/// Clones share the same underlying map.
///
/// # Example
///
/// ```rust,no_run
/// use cnames_core::cache::MemoryCacheStore;
/// use cnames_core::traits::CacheStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryCacheStore::new();
///     store.put("validate_cnames", serde_json::json!({})).await?;
///     assert_eq!(store.len().await, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl MemoryCacheStore {
    /// Create a new empty memory cache store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blobs in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all blobs from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, Error> {
        validate_cache_name(name)?;
        Ok(self.inner.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, value: serde_json::Value) -> Result<(), Error> {
        validate_cache_name(name)?;
        self.inner.write().await.insert(name.to_string(), value);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        validate_cache_name(name)?;
        self.inner.write().await.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
