//! Catalog retrieval: the network source and the caching resolver on top of it.
//!
//! This module defines the `CatalogSource` trait implemented by anything that can
//! produce a fresh catalog and its version marker, the HTTP implementation of
//! it, and the `CatalogResolver` that decides when a network round trip is
//! actually needed.
mod cached;
mod http;

pub use cached::{CatalogResolver, ResolverOptions};
pub use http::{HttpCatalogSource, HttpSourceConfig};

use crate::catalog::Catalog;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while retrieving the catalog.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, connection failure or a non-2xx status
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// The response arrived but is not the expected document
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    /// The caller cancelled the operation
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Short label for the failure class, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Decode { .. } => "decode",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The remote version document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Monotonic version marker, comparable to `Catalog::last_update_ts`
    pub version: u64,
    #[serde(default)]
    pub last_update: String,
}

/// Trait for sources that can produce the current catalog.
///
/// Both operations must honour the cancellation token: once it fires, any
/// in-flight request is dropped and `FetchError::Cancelled` is returned.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the small version document.
    async fn fetch_version(&self, cancel: &CancellationToken) -> Result<VersionInfo, FetchError>;

    /// Fetches and parses the full catalog document.
    async fn fetch_catalog(&self, cancel: &CancellationToken) -> Result<Catalog, FetchError>;
}
