//! HTTP catalog source implementation.
use super::{CatalogSource, FetchError, VersionInfo};
use crate::catalog::Catalog;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Endpoints and timeouts for `HttpCatalogSource`.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// URL of the full catalog document
    pub catalog_url: String,
    /// URL of the small version document
    pub version_url: String,
    /// Timeout for the version probe
    pub version_timeout: Duration,
    /// Timeout for the full catalog download
    pub catalog_timeout: Duration,
}

/// Catalog source backed by plain HTTPS GET requests.
///
/// The version probe uses a much shorter timeout than the catalog download so
/// that a slow status endpoint cannot hold up falling back to the cache.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpCatalogSource {
    /// Creates a new HTTP source.
    pub fn new(config: HttpSourceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client, config })
    }

    /// GETs `url` and decodes the body as JSON, aborting on cancellation.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.get_json_uncancelled(url, timeout) => result,
        }
    }

    async fn get_json_uncancelled<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", timeout.as_secs_f32())
            } else {
                e.to_string()
            },
        };

        debug!(url, "Fetching");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(network)?;

        // Ensure request was successful
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                reason: format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let body = response.bytes().await.map_err(network)?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_version(&self, cancel: &CancellationToken) -> Result<VersionInfo, FetchError> {
        self.get_json(
            &self.config.version_url,
            self.config.version_timeout,
            cancel,
        )
        .await
    }

    async fn fetch_catalog(&self, cancel: &CancellationToken) -> Result<Catalog, FetchError> {
        self.get_json(
            &self.config.catalog_url,
            self.config.catalog_timeout,
            cancel,
        )
        .await
    }
}
