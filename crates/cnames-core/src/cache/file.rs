// # File Cache Store
//
// File-based implementation of CacheStore with crash recovery.
//
// ## Purpose
//
// Keeps probe checkpoints across process restarts so an interrupted run
// resumes where it stopped.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good blob
// - Recovery: Falls back to backup if corruption detected, else a miss
//
// ## File Format
//
// One file per name, `<dir>/<name>.json`:
//
// ```json
// {
//   "version": "1.0",
//   "saved_at": "2025-01-09T12:00:00Z",
//   "data": { "foo": { "target": "foo.github.io", "failed": false } }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::cache_store::{CacheStore, validate_cache_name};

/// Cache file format version
/// Used for future migration if format changes
const CACHE_FILE_VERSION: &str = "1.0";

/// File-based cache store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use cnames_core::cache::FileCacheStore;
/// use cnames_core::traits::CacheStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileCacheStore::new("cache").await?;
///
///     store.put("validate_cnames", serde_json::json!({})).await?;
///     assert!(store.get("validate_cnames").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileCacheStore {
    dir: PathBuf,
    /// Serializes writers so two puts never interleave their renames
    write_lock: Mutex<()>,
}

/// Serializable cache file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CacheFileFormat {
    version: String,
    saved_at: chrono::DateTime<chrono::Utc>,
    data: serde_json::Value,
}

impl FileCacheStore {
    /// Open a cache directory, creating it if needed
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(&dir).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create cache directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(path: &Path) -> PathBuf {
        path.with_extension("tmp")
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }

    /// Load a blob with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If it is malformed, try loading backup
    /// 3. If backup also fails, report a miss
    async fn load_with_recovery(path: &Path) -> Result<Option<serde_json::Value>, Error> {
        match Self::load_blob(path).await {
            Ok(data) => Ok(data),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Cache file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                match Self::load_blob(&backup_path).await {
                    Ok(Some(data)) => {
                        tracing::info!("Recovered cache from backup {}", backup_path.display());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore cache file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(Some(data))
                    }
                    Ok(None) => {
                        tracing::warn!("No backup file found. Treating cache as empty.");
                        Ok(None)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Treating cache as empty.",
                            backup_err
                        );
                        Ok(None)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load a blob from file
    async fn load_blob(path: &Path) -> Result<Option<serde_json::Value>, Error> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::cache_store(format!(
                "Failed to read cache file {}: {}",
                path.display(),
                e
            ))
        })?;

        let blob: CacheFileFormat = serde_json::from_str(&content)?;

        if blob.version != CACHE_FILE_VERSION {
            tracing::warn!(
                "Cache file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                CACHE_FILE_VERSION,
                blob.version
            );
        }

        Ok(Some(blob.data))
    }

    /// Write a blob atomically
    async fn write_blob(&self, path: &Path, data: serde_json::Value) -> Result<(), Error> {
        let blob = CacheFileFormat {
            version: CACHE_FILE_VERSION.to_string(),
            saved_at: chrono::Utc::now(),
            data,
        };

        let json = serde_json::to_string_pretty(&blob)
            .map_err(|e| Error::cache_store(format!("Failed to serialize cache blob: {}", e)))?;

        let _guard = self.write_lock.lock().await;

        // Write to temporary file first
        let temp_path = Self::temp_path(path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::cache_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if path.exists() {
            let backup_path = Self::backup_path(path);
            if let Err(e) = fs::copy(path, &backup_path).await {
                tracing::warn!("Failed to create cache backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, path).await.map_err(|e| {
            Error::cache_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("Cache blob written to {}", path.display());
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::cache_store(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>, Error> {
        validate_cache_name(name)?;
        Self::load_with_recovery(&self.blob_path(name)).await
    }

    async fn put(&self, name: &str, value: serde_json::Value) -> Result<(), Error> {
        validate_cache_name(name)?;
        self.write_blob(&self.blob_path(name), value).await
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        validate_cache_name(name)?;
        let path = self.blob_path(name);

        let _guard = self.write_lock.lock().await;
        remove_if_exists(&path).await?;
        remove_if_exists(&Self::backup_path(&path)).await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
