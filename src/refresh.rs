//! Periodic catalog refresh
//!
//! The host decides whether and where to run this; nothing in the crate spawns
//! it on its own.

use crate::MetadataService;
use crate::config::ConfigError;
use crate::metadata_retrieval::{CatalogSource, FetchError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Forces a catalog refresh every `period` until `cancel` fires
///
/// The first refresh happens one period after the call. Failures are logged
/// and retried on the next tick.
///
/// # Returns
///
/// `Ok(())` once cancelled, or a `ConfigError::ValidationError` right away if
/// `period` is too long to schedule.
///
/// # Examples
///
/// ```ignore
/// let service = Arc::new(MetadataService::from_settings(settings)?);
/// let cancel = CancellationToken::new();
/// if let Some(period) = service.auto_refresh_period() {
///     let service = Arc::clone(&service);
///     let cancel = cancel.clone();
///     tokio::spawn(async move { run_auto_refresh(&service, period, cancel).await });
/// }
/// ```
pub async fn run_auto_refresh<S>(
    service: &MetadataService<S>,
    period: Duration,
    cancel: CancellationToken,
) -> Result<(), ConfigError>
where
    S: CatalogSource,
{
    let first = Instant::now().checked_add(period).ok_or_else(|| {
        ConfigError::ValidationError(format!(
            "auto refresh period of {}s is too long",
            period.as_secs()
        ))
    })?;
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "Auto refresh started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match service.get_catalog(true, &cancel).await {
            Ok(catalog) => debug!(version = catalog.last_update_ts, "Scheduled refresh done"),
            Err(FetchError::Cancelled) => break,
            Err(e) => warn!(error = %e, kind = e.kind(), "Scheduled refresh failed"),
        }
    }

    info!("Auto refresh stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CatalogStore;
    use crate::catalog::fixtures::sample_catalog;
    use crate::config::load_settings_from_str;
    use crate::testing::MockCatalogSource;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service_in(dir: &TempDir) -> Arc<MetadataService<MockCatalogSource>> {
        let settings = load_settings_from_str(
            r#"
catalog_url = "https://example.org/data.json"
version_url = "https://example.org/status.json"
"#,
        )
        .unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();
        Arc::new(MetadataService::new(
            MockCatalogSource::new(sample_catalog()),
            store,
            settings,
        ))
    }

    #[tokio::test]
    async fn test_refreshes_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let cancel = CancellationToken::new();

        let task = {
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_auto_refresh(service.as_ref(), Duration::from_millis(20), cancel).await
            })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while service.resolver().source().catalog_calls() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("two scheduled refreshes");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("refresh loop stops after cancellation")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        service.resolver().source().set_catalog(None);
        let cancel = CancellationToken::new();

        let task = {
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_auto_refresh(service.as_ref(), Duration::from_millis(20), cancel).await
            })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while service.resolver().source().catalog_calls() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refresh keeps retrying");

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_no_refresh_before_first_period() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_auto_refresh(service.as_ref(), Duration::from_secs(3600), cancel)
            .await
            .unwrap();
        assert_eq!(service.resolver().source().catalog_calls(), 0);
    }

    #[tokio::test]
    async fn test_unschedulable_period_is_an_error() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir);

        let result = run_auto_refresh(
            service.as_ref(),
            Duration::from_secs(u64::MAX),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        assert_eq!(service.resolver().source().catalog_calls(), 0);
    }
}
