//! Mock catalog source for unit tests.

use crate::catalog::Catalog;
use crate::metadata_retrieval::{CatalogSource, FetchError, VersionInfo};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Controllable in-memory `CatalogSource`.
///
/// - Returns a configurable catalog and version
/// - Counts calls for assertions
/// - Simulates failures and slow responses
#[derive(Debug)]
pub(crate) struct MockCatalogSource {
    catalog: Mutex<Option<Catalog>>,
    version: Mutex<Option<u64>>,
    delay: Mutex<Duration>,
    catalog_calls: AtomicUsize,
    version_calls: AtomicUsize,
}

impl MockCatalogSource {
    /// Serves `catalog`, and its `last_update_ts` as the remote version
    pub(crate) fn new(catalog: Catalog) -> Self {
        let version = catalog.last_update_ts;
        Self {
            catalog: Mutex::new(Some(catalog)),
            version: Mutex::new(Some(version)),
            delay: Mutex::new(Duration::ZERO),
            catalog_calls: AtomicUsize::new(0),
            version_calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the served catalog; `None` makes every fetch fail
    pub(crate) fn set_catalog(&self, catalog: Option<Catalog>) {
        *self.catalog.lock().unwrap() = catalog;
    }

    /// Replaces the served version; `None` makes every probe fail
    pub(crate) fn set_version(&self, version: Option<u64>) {
        *self.version.lock().unwrap() = version;
    }

    /// Makes both operations wait before answering
    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        let delay = *self.delay.lock().unwrap();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_version(&self, cancel: &CancellationToken) -> Result<VersionInfo, FetchError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.wait(cancel).await?;

        let version = *self.version.lock().unwrap();
        version
            .map(|version| VersionInfo {
                version,
                last_update: String::new(),
            })
            .ok_or_else(|| FetchError::Network {
                url: "mock://version".to_string(),
                reason: "connection refused".to_string(),
            })
    }

    async fn fetch_catalog(&self, cancel: &CancellationToken) -> Result<Catalog, FetchError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.wait(cancel).await?;

        let catalog = self.catalog.lock().unwrap().clone();
        catalog.ok_or_else(|| FetchError::Network {
            url: "mock://catalog".to_string(),
            reason: "HTTP 503 Service Unavailable".to_string(),
        })
    }
}
