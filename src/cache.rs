//! Cache storage module
//!
//! This module provides the durable tier of the catalog cache: exactly one
//! catalog blob and one version marker inside a single cache directory.
//! The catalog is stored as JSON in the same shape as the remote document.

use crate::catalog::Catalog;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

const CATALOG_FILE: &str = "catalog.json";
const VERSION_FILE: &str = "version";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to determine cache directory location
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,

    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to read cached data
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write cached data
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to deserialize cached data
    #[error("Failed to deserialize cache file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for caching
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A catalog read back from disk together with its age
#[derive(Debug)]
pub struct CachedCatalog {
    pub catalog: Catalog,
    /// Time since the cache file was last written
    pub age: Duration,
}

/// Single-slot durable catalog cache
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves either the previous file or no file at all.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    /// The directory where cached data is stored
    cache_dir: PathBuf,
}

impl CatalogStore {
    /// Opens or creates the cache in the given directory
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory holding the catalog and version files
    ///
    /// # Returns
    ///
    /// A Result containing the CatalogStore or a CacheError if the directory
    /// cannot be created
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let store = CatalogStore::open(Path::new("/var/cache/pace-metadata"))?;
    /// ```
    pub fn open(cache_dir: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::DirectoryCreationFailed {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Returns the platform cache directory for this application
    ///
    /// - Linux: ~/.cache/pace-metadata/
    /// - macOS: ~/Library/Caches/pace-metadata/
    /// - Windows: %LOCALAPPDATA%\pace-metadata\cache\
    pub fn default_dir() -> Result<PathBuf, CacheError> {
        let proj_dirs = directories::ProjectDirs::from("", "", "pace-metadata")
            .ok_or(CacheError::CacheDirectoryNotFound)?;
        Ok(proj_dirs.cache_dir().to_path_buf())
    }

    /// Loads the cached catalog
    ///
    /// # Arguments
    ///
    /// * `max_age` - Maximum age by modification time, `None` for any age
    ///
    /// # Returns
    ///
    /// The catalog and its age, or None if there is no file or it is older
    /// than `max_age`. Returns an error only if the file exists but cannot be
    /// read or parsed.
    pub async fn load_catalog(
        &self,
        max_age: Option<Duration>,
    ) -> Result<Option<CachedCatalog>, CacheError> {
        let file_path = self.catalog_path();

        let metadata = match fs::metadata(&file_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::ReadFailed {
                    path: file_path,
                    source: e,
                });
            }
        };

        // A modification time in the future counts as brand new
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();

        if let Some(max_age) = max_age {
            if age >= max_age {
                debug!(age_secs = age.as_secs(), "Disk catalog is stale");
                return Ok(None);
            }
        }

        let content = fs::read(&file_path)
            .await
            .map_err(|e| CacheError::ReadFailed {
                path: file_path.clone(),
                source: e,
            })?;

        let catalog =
            serde_json::from_slice(&content).map_err(|e| CacheError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        Ok(Some(CachedCatalog { catalog, age }))
    }

    /// Replaces the cached catalog
    ///
    /// # Arguments
    ///
    /// * `catalog` - The catalog to persist
    ///
    /// # Returns
    ///
    /// A Result indicating success or failure; on failure the previous file is
    /// left untouched
    pub async fn store_catalog(&self, catalog: &Catalog) -> Result<(), CacheError> {
        let content = serde_json::to_vec(catalog)?;
        self.write_atomic(&self.catalog_path(), &content).await
    }

    /// Loads the version marker
    ///
    /// # Returns
    ///
    /// The stored version, or 0 ("unknown") if the marker is missing or
    /// unreadable
    pub async fn load_version(&self) -> u64 {
        match fs::read_to_string(self.version_path()).await {
            Ok(content) => content.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Replaces the version marker
    ///
    /// # Arguments
    ///
    /// * `version` - The `last_update_ts` of the catalog just stored
    pub async fn store_version(&self, version: u64) -> Result<(), CacheError> {
        self.write_atomic(&self.version_path(), version.to_string().as_bytes())
            .await
    }

    /// Returns the path to the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn catalog_path(&self) -> PathBuf {
        self.cache_dir.join(CATALOG_FILE)
    }

    fn version_path(&self) -> PathBuf {
        self.cache_dir.join(VERSION_FILE)
    }

    /// Writes to a sibling temporary file, then renames it over the target
    async fn write_atomic(&self, target: &Path, content: &[u8]) -> Result<(), CacheError> {
        let temp_path = target.with_extension("tmp");

        fs::write(&temp_path, content)
            .await
            .map_err(|e| CacheError::WriteFailed {
                path: temp_path.clone(),
                source: e,
            })?;

        if let Err(e) = fs::rename(&temp_path, target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::WriteFailed {
                path: target.to_path_buf(),
                source: e,
            });
        }

        Ok(())
    }
}
