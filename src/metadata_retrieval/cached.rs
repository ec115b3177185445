//! Cached catalog resolver
//!
//! This module wraps a `CatalogSource` with the two cache tiers (memory and
//! disk) and the version probe, so that most requests are answered without
//! any network round trip.

use super::{CatalogSource, FetchError};
use crate::cache::CatalogStore;
use crate::catalog::Catalog;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Freshness settings for `CatalogResolver`
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// How long a fetched catalog is served without asking the network
    pub cache_duration: Duration,
    /// How long a catalog served after a failed refresh counts as fresh
    ///
    /// Capped at `cache_duration`.
    pub failure_backoff: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(24 * 60 * 60),
            failure_backoff: Duration::from_secs(5 * 60),
        }
    }
}

/// Freshness deadline used when `now + fresh_for` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// The mutable slot shared by all callers
#[derive(Debug, Default)]
struct ResolverState {
    catalog: Option<Arc<Catalog>>,
    fresh_until: Option<Instant>,
    /// Version of the newest catalog we hold; `None` until read from disk
    known_version: Option<u64>,
}

impl ResolverState {
    fn fresh_catalog(&self) -> Option<Arc<Catalog>> {
        match (&self.catalog, self.fresh_until) {
            (Some(catalog), Some(until)) if Instant::now() < until => Some(Arc::clone(catalog)),
            _ => None,
        }
    }

    fn adopt(&mut self, catalog: Arc<Catalog>, fresh_for: Duration) {
        let now = Instant::now();
        self.catalog = Some(catalog);
        self.fresh_until = now
            .checked_add(fresh_for)
            .or_else(|| now.checked_add(FAR_FUTURE));
    }
}

/// Resolves the current catalog from memory, disk or the network
///
/// One async mutex guards the whole check-fetch-store sequence. Callers that
/// arrive while a download is running wait for it and are then served the
/// freshly stored catalog, so concurrent requests never start a second
/// download.
///
/// # Examples
///
/// ```ignore
/// let resolver = CatalogResolver::new(source, store, ResolverOptions::default());
/// let catalog = resolver.resolve(false, &CancellationToken::new()).await?;
/// ```
#[derive(Debug)]
pub struct CatalogResolver<S> {
    source: S,
    store: CatalogStore,
    options: ResolverOptions,
    state: Mutex<ResolverState>,
}

impl<S> CatalogResolver<S>
where
    S: CatalogSource,
{
    pub fn new(source: S, store: CatalogStore, options: ResolverOptions) -> Self {
        Self {
            source,
            store,
            options,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Returns the current catalog
    ///
    /// Policy, first hit wins unless `force_refresh` is set:
    /// 1. memory copy younger than the cache duration
    /// 2. disk copy whose modification time is younger than the cache duration
    /// 3. local copy (memory or disk) when the remote version is not newer
    /// 4. full download, stored to memory and disk
    ///
    /// With `force_refresh` only step 4 runs. If the download fails, any local
    /// copy is served instead; the error is returned only when there is none.
    pub async fn resolve(
        &self,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<Catalog>, FetchError> {
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            state = self.state.lock() => state,
        };

        if force_refresh {
            debug!("Forced catalog refresh");
        } else {
            if let Some(catalog) = state.fresh_catalog() {
                return Ok(catalog);
            }

            if let Some(catalog) = self.adopt_fresh_disk_copy(&mut state).await {
                return Ok(catalog);
            }

            if let Some(catalog) = self.serve_if_current(&mut state, cancel).await {
                return Ok(catalog);
            }
        }

        self.download(&mut state, cancel).await
    }

    /// Returns the underlying catalog source
    pub fn source(&self) -> &S {
        &self.source
    }

    fn backoff(&self) -> Duration {
        self.options
            .failure_backoff
            .min(self.options.cache_duration)
    }

    async fn adopt_fresh_disk_copy(&self, state: &mut ResolverState) -> Option<Arc<Catalog>> {
        match self
            .store
            .load_catalog(Some(self.options.cache_duration))
            .await
        {
            Ok(Some(cached)) => {
                debug!(age_secs = cached.age.as_secs(), "Using disk catalog");
                let catalog = Arc::new(cached.catalog);
                let remaining = self.options.cache_duration.saturating_sub(cached.age);
                state.adopt(Arc::clone(&catalog), remaining);
                Some(catalog)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable disk catalog");
                None
            }
        }
    }

    /// Probes the remote version and serves the local copy if it is current
    ///
    /// Returns `None` when a download is required.
    async fn serve_if_current(
        &self,
        state: &mut ResolverState,
        cancel: &CancellationToken,
    ) -> Option<Arc<Catalog>> {
        let known = match state.known_version {
            Some(version) => version,
            None => {
                let version = self.store.load_version().await;
                state.known_version = Some(version);
                version
            }
        };

        if known == 0 {
            debug!("No local version marker, full fetch required");
            return None;
        }

        let local = self.local_catalog(state).await?;

        match self.source.fetch_version(cancel).await {
            Ok(remote) if remote.version <= known => {
                debug!(known, remote = remote.version, "Catalog is up to date");
                state.adopt(Arc::clone(&local), self.options.cache_duration);
                Some(local)
            }
            Ok(remote) => {
                info!(known, remote = remote.version, "Newer catalog available");
                None
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Version probe failed, serving cached catalog");
                state.adopt(Arc::clone(&local), self.backoff());
                Some(local)
            }
        }
    }

    async fn download(
        &self,
        state: &mut ResolverState,
        cancel: &CancellationToken,
    ) -> Result<Arc<Catalog>, FetchError> {
        match self.source.fetch_catalog(cancel).await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                info!(
                    version = catalog.last_update_ts,
                    arcs = catalog.arcs.len(),
                    "Catalog refreshed"
                );

                // The marker must never claim a version the disk copy lacks
                match self.store.store_catalog(&catalog).await {
                    Ok(()) => {
                        if let Err(e) = self.store.store_version(catalog.last_update_ts).await {
                            warn!(error = %e, "Failed to persist version marker");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to persist catalog"),
                }

                state.known_version = Some(catalog.last_update_ts);
                state.adopt(Arc::clone(&catalog), self.options.cache_duration);
                Ok(catalog)
            }
            Err(e) => match self.local_catalog(state).await {
                Some(fallback) => {
                    warn!(error = %e, kind = e.kind(), "Catalog refresh failed, serving previous catalog");
                    state.adopt(Arc::clone(&fallback), self.backoff());
                    Ok(fallback)
                }
                None => {
                    warn!(error = %e, kind = e.kind(), "Catalog refresh failed and nothing is cached");
                    Err(e)
                }
            },
        }
    }

    /// Memory copy, else disk copy of any age
    async fn local_catalog(&self, state: &ResolverState) -> Option<Arc<Catalog>> {
        if let Some(catalog) = &state.catalog {
            return Some(Arc::clone(catalog));
        }

        match self.store.load_catalog(None).await {
            Ok(cached) => cached.map(|cached| Arc::new(cached.catalog)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable disk catalog");
                None
            }
        }
    }
}
