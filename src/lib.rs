//! pace-metadata - Resolve fan-edit video files against a remote catalog
//!
//! This library keeps a remotely hosted arc/episode catalog available and
//! fresh, matches local media files to catalog episodes and resolves arc
//! poster URLs. A host media library drives it through `MetadataService`,
//! one call per library item.

mod cache;
mod catalog;
mod config;
mod episode_matcher;
mod file_resolver;
mod image_resolver;
mod metadata;
mod metadata_retrieval;
mod refresh;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Re-export error types
pub use cache::CacheError;
pub use config::ConfigError;
pub use file_resolver::FileResolverError;
pub use metadata_retrieval::FetchError;

pub use cache::{CachedCatalog, CatalogStore};
pub use catalog::{Catalog, Episode, EpisodeMap, Series, SeriesStatus, StoryArc, parse_length};
pub use config::{Settings, load_settings, load_settings_from_str};
pub use episode_matcher::{EpisodeMatch, FileCandidate, MatchTier, extract_checksum, match_episode};
pub use file_resolver::{VideoFile, guess_hints, scan_for_videos};
pub use image_resolver::{SeasonHint, poster_url, resolve_arc_poster};
pub use metadata::{EpisodeMetadata, SeasonMetadata, SeriesMetadata};
pub use metadata_retrieval::{
    CatalogResolver, CatalogSource, HttpCatalogSource, HttpSourceConfig, ResolverOptions,
    VersionInfo,
};
pub use refresh::run_auto_refresh;

/// Top-level error type for pace-metadata operations
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Invalid or unreadable settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error during cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Error during catalog retrieval
    #[error("Catalog retrieval error: {0}")]
    Fetch(#[from] FetchError),

    /// Error during file resolution
    #[error("File resolution error: {0}")]
    FileResolver(#[from] FileResolverError),
}

/// The host-facing entry point
///
/// Constructed once and shared (usually as `Arc<MetadataService>`) with every
/// consumer. It owns the only mutable state of the crate, the current catalog.
#[derive(Debug)]
pub struct MetadataService<S = HttpCatalogSource> {
    resolver: CatalogResolver<S>,
    settings: Settings,
}

impl MetadataService<HttpCatalogSource> {
    /// Builds the service with the HTTP source and the configured cache directory
    pub fn from_settings(settings: Settings) -> Result<Self, MetadataError> {
        settings.validate()?;

        let cache_dir = match &settings.cache_dir {
            Some(dir) => dir.clone(),
            None => CatalogStore::default_dir()?,
        };
        let store = CatalogStore::open(&cache_dir)?;
        let source = HttpCatalogSource::new(settings.http_source_config())?;

        debug!(cache_dir = %cache_dir.display(), "Metadata service ready");
        Ok(Self::new(source, store, settings))
    }
}

impl<S> MetadataService<S>
where
    S: CatalogSource,
{
    pub fn new(source: S, store: CatalogStore, settings: Settings) -> Self {
        Self {
            resolver: CatalogResolver::new(source, store, settings.resolver_options()),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &CatalogResolver<S> {
        &self.resolver
    }

    /// Returns the current catalog, see `CatalogResolver::resolve`
    pub async fn get_catalog(
        &self,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<Catalog>, FetchError> {
        self.resolver.resolve(force_refresh, cancel).await
    }

    /// Downloads the catalog now, ignoring every cache tier
    ///
    /// Unlike `get_catalog(true, ..)`, an interrupted download is reported as
    /// `FetchError::Cancelled` even when a previous catalog could be served.
    pub async fn refresh_catalog(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Catalog>, FetchError> {
        let catalog = self.get_catalog(true, cancel).await?;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        Ok(catalog)
    }

    /// Matches a file using the configured checksum preference
    pub fn match_episode<'a>(
        &self,
        candidate: &FileCandidate,
        catalog: &'a Catalog,
    ) -> Option<EpisodeMatch<'a>> {
        match_episode(candidate, catalog, self.settings.prefer_checksum_matching)
    }

    /// Resolves an arc poster URL; always `None` when poster download is off
    pub fn resolve_poster(&self, hint: SeasonHint<'_>, catalog: &Catalog) -> Option<String> {
        if !self.settings.enable_poster_download {
            return None;
        }
        resolve_arc_poster(hint, catalog)
    }

    /// Catalog lookup and match for one library item
    ///
    /// Any failure is logged and reported as `None`, so one bad item never
    /// aborts a library scan.
    pub async fn episode_metadata(
        &self,
        candidate: &FileCandidate,
        cancel: &CancellationToken,
    ) -> Option<EpisodeMetadata> {
        let catalog = self.catalog_or_log(cancel).await?;
        self.match_episode(candidate, &catalog)
            .map(|found| EpisodeMetadata::from_match(&found))
    }

    /// Series metadata from the current catalog
    pub async fn series_metadata(&self, cancel: &CancellationToken) -> Option<SeriesMetadata> {
        let catalog = self.catalog_or_log(cancel).await?;
        Some(SeriesMetadata::from_catalog(&catalog))
    }

    /// Season metadata for the arc with the given `part`
    pub async fn season_metadata(
        &self,
        index: u32,
        cancel: &CancellationToken,
    ) -> Option<SeasonMetadata> {
        let catalog = self.catalog_or_log(cancel).await?;
        catalog.arc_by_part(index).map(SeasonMetadata::from_arc)
    }

    /// Period for `run_auto_refresh`, `None` when auto update is disabled
    pub fn auto_refresh_period(&self) -> Option<Duration> {
        self.settings.auto_update_interval()
    }

    async fn catalog_or_log(&self, cancel: &CancellationToken) -> Option<Arc<Catalog>> {
        match self.get_catalog(false, cancel).await {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "No catalog available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::sample_catalog;
    use crate::testing::MockCatalogSource;
    use tempfile::TempDir;

    fn service_with(dir: &TempDir, extra: &str) -> MetadataService<MockCatalogSource> {
        let settings = load_settings_from_str(&format!(
            r#"
catalog_url = "https://example.org/data.json"
version_url = "https://example.org/status.json"
{extra}
"#
        ))
        .unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();
        MetadataService::new(MockCatalogSource::new(sample_catalog()), store, settings)
    }

    #[tokio::test]
    async fn test_episode_metadata_for_release_file() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "");
        let candidate =
            FileCandidate::new("/media/[One Pace][1-7] Romance Dawn 01 [1080p][D767799C].mkv");

        let episode = service
            .episode_metadata(&candidate, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(episode.season_index, 1);
        assert_eq!(episode.episode_key, "01");
        assert_eq!(episode.matched_by, MatchTier::Checksum);
    }

    #[tokio::test]
    async fn test_checksum_preference_comes_from_settings() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "prefer_checksum_matching = false");
        let catalog = service
            .get_catalog(false, &CancellationToken::new())
            .await
            .unwrap();

        let candidate = FileCandidate::new("x [D767799C].mkv").with_hints(Some(2), Some(2));
        let found = service.match_episode(&candidate, &catalog).unwrap();
        assert_eq!(found.tier, MatchTier::Hint);
        assert_eq!(found.arc.part, 2);
    }

    #[tokio::test]
    async fn test_unavailable_catalog_is_no_metadata() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "");
        service.resolver().source().set_catalog(None);
        let cancel = CancellationToken::new();

        let candidate = FileCandidate::new("x [D767799C].mkv");
        assert!(service.episode_metadata(&candidate, &cancel).await.is_none());
        assert!(service.series_metadata(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_series_and_season_metadata() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "");
        let cancel = CancellationToken::new();

        let series = service.series_metadata(&cancel).await.unwrap();
        assert_eq!(series.title, "One Pace");

        let season = service.season_metadata(2, &cancel).await.unwrap();
        assert_eq!(season.name, "Orange Town");
        assert!(service.season_metadata(7, &cancel).await.is_none());

        // Three lookups, one download
        assert_eq!(service.resolver().source().catalog_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_catalog_downloads() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "");
        let cancel = CancellationToken::new();

        service.get_catalog(false, &cancel).await.unwrap();
        let catalog = service.refresh_catalog(&cancel).await.unwrap();

        assert_eq!(catalog.last_update_ts, sample_catalog().last_update_ts);
        assert_eq!(service.resolver().source().catalog_calls(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_refresh_is_not_reported_as_success() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "");
        let cancel = CancellationToken::new();

        // A previous catalog exists, so the resolver itself would fall back to it
        service.get_catalog(false, &cancel).await.unwrap();
        service
            .resolver()
            .source()
            .set_delay(Duration::from_secs(30));

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let result = service.refresh_catalog(&cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));

        // The fallback copy is still served to ordinary lookups
        let catalog = service
            .get_catalog(false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(catalog.arcs.len(), 2);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_poster_download_switch() {
        let dir = TempDir::new().unwrap();
        let catalog = sample_catalog();

        let enabled = service_with(&dir, "");
        assert!(enabled.resolve_poster(SeasonHint::index(1), &catalog).is_some());

        let disabled = service_with(&dir, "enable_poster_download = false");
        assert!(disabled.resolve_poster(SeasonHint::index(1), &catalog).is_none());
    }

    #[test]
    fn test_auto_refresh_period() {
        let dir = TempDir::new().unwrap();
        let service = service_with(&dir, "auto_update_interval_hours = 6");
        assert_eq!(
            service.auto_refresh_period(),
            Some(Duration::from_secs(6 * 3600))
        );

        let service = service_with(&dir, "auto_update_enabled = false");
        assert_eq!(service.auto_refresh_period(), None);
    }
}
