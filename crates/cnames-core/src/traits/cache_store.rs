// # Cache Store Trait
//
// Defines the interface for the keyed checkpoint store.
//
// ## Purpose
//
// Long operations (a probe run over thousands of hosts) checkpoint their
// partial results under a logical name so an interrupted run can resume
// without redoing finished work.
//
// ## Implementations
//
// - File-based: one JSON file per name (`FileCacheStore`)
// - In-memory: `MemoryCacheStore`, for tests and throwaway runs
//
// ## Usage
//
// Callers normally go through a typed [`crate::CacheKey`] rather than the raw
// JSON values:
//
// ```rust,ignore
// use cnames_core::{PROBE_RESULTS, Registry};
//
// let previous: Option<Registry> = PROBE_RESULTS.load(store.as_ref()).await;
// PROBE_RESULTS.save(store.as_ref(), &results).await?;
// PROBE_RESULTS.invalidate(store.as_ref()).await?;
// ```

use async_trait::async_trait;

/// Trait for cache store implementations
///
/// Values are opaque JSON blobs addressed by a logical operation name.
/// Access is last-writer-wins per name; a single process is assumed to own
/// a given name at a time.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the blob stored under `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Value))`: The stored blob
    /// - `Ok(None)`: Nothing stored, or the stored blob is unreadable
    /// - `Err(Error)`: Storage error
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, crate::Error>;

    /// Store `value` under `name`, replacing any previous blob
    ///
    /// The write is durable when this returns: a process killed right after
    /// `put` returns finds `value` on restart. Checkpointing callers rely on
    /// this to lose at most the work in flight.
    async fn put(&self, name: &str, value: serde_json::Value) -> Result<(), crate::Error>;

    /// Delete the blob stored under `name`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Deleted (or didn't exist)
    /// - `Err(Error)`: Storage error
    async fn delete(&self, name: &str) -> Result<(), crate::Error>;

    /// List all names with a stored blob
    async fn list(&self) -> Result<Vec<String>, crate::Error>;
}

/// Check that a cache name is safe to use as a file stem
pub fn validate_cache_name(name: &str) -> Result<(), crate::Error> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(crate::Error::invalid_input(format!(
            "cache name '{name}' must be non-empty and contain only [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_names() {
        assert!(validate_cache_name("validate_cnames").is_ok());
        assert!(validate_cache_name("get-cnames-2").is_ok());
        assert!(validate_cache_name("").is_err());
        assert!(validate_cache_name("../etc/passwd").is_err());
        assert!(validate_cache_name("a.json").is_err());
    }
}
