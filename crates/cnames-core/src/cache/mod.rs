// # Cache Store Implementations
//
// This module provides implementations of the CacheStore trait and the typed
// keys callers use to read and write them.
//
// Each logical operation owns one name and one value shape:
//
// | Key              | Name               | Shape      |
// |------------------|--------------------|------------|
// | `PROBE_RESULTS`  | `validate_cnames`  | `Registry` |
// | `REGISTRY_FILE`  | `get_cnames_file`  | `String`   |

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::marker::PhantomData;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::registry::Registry;
use crate::traits::CacheStore;

/// Accumulated per-entry probe results of the current run
pub const PROBE_RESULTS: CacheKey<Registry> = CacheKey::new("validate_cnames");

/// Raw registry file text fetched from the hosting service
pub const REGISTRY_FILE: CacheKey<String> = CacheKey::new("get_cnames_file");

/// A named cache slot holding values of type `T`
#[derive(Debug, Clone)]
pub struct CacheKey<T> {
    name: Cow<'static, str>,
    _shape: PhantomData<fn() -> T>,
}

impl<T> CacheKey<T> {
    /// Key with a static name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _shape: PhantomData,
        }
    }

    /// Key with a runtime name, for operations whose name is configurable
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _shape: PhantomData,
        }
    }

    /// The logical name the value is stored under
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> CacheKey<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Load the cached value
    ///
    /// Missing, unreadable and malformed blobs are all a cache miss. A miss
    /// only costs recomputation, so it is logged and never surfaced.
    pub async fn load(&self, store: &dyn CacheStore) -> Option<T> {
        let value = match store.get(self.name()).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read for '{}' failed, treating as miss: {}", self.name(), e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(
                    "Cached data for '{}' has an unexpected shape, treating as miss: {}",
                    self.name(),
                    e
                );
                None
            }
        }
    }

    /// Replace the cached value
    pub async fn save(&self, store: &dyn CacheStore, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        store.put(self.name(), value).await
    }

    /// Remove the cached value
    pub async fn invalidate(&self, store: &dyn CacheStore) -> Result<()> {
        store.delete(self.name()).await
    }
}

/// Construct the cache store selected by configuration
pub async fn open_cache_store(config: &CacheConfig) -> Result<Box<dyn CacheStore>> {
    match config {
        CacheConfig::File { dir } => Ok(Box::new(FileCacheStore::new(dir).await?)),
        CacheConfig::Memory => Ok(Box::new(MemoryCacheStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Entry;

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = MemoryCacheStore::new();

        let mut registry = Registry::new();
        registry.insert("foo", Entry::new("foo.github.io"));

        PROBE_RESULTS.save(&store, &registry).await.unwrap();
        assert_eq!(PROBE_RESULTS.load(&store).await, Some(registry));

        PROBE_RESULTS.invalidate(&store).await.unwrap();
        assert_eq!(PROBE_RESULTS.load(&store).await, None);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_miss() {
        let store = MemoryCacheStore::new();
        store
            .put("validate_cnames", serde_json::json!([1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(PROBE_RESULTS.load(&store).await, None);
    }

    #[tokio::test]
    async fn test_named_keys_are_independent() {
        let store = MemoryCacheStore::new();
        let a: CacheKey<String> = CacheKey::named("run_a");
        let b: CacheKey<String> = CacheKey::named("run_b");

        a.save(&store, &"first".to_string()).await.unwrap();
        assert_eq!(a.load(&store).await.as_deref(), Some("first"));
        assert_eq!(b.load(&store).await, None);
    }
}
