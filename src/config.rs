//! Configuration
//!
//! Settings are read from an optional TOML file and `PACE_METADATA_*`
//! environment variables, environment taking precedence.

use crate::metadata_retrieval::{HttpSourceConfig, ResolverOptions};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "PACE_METADATA_";

/// Upper bound for every configured period, ten years
const MAX_PERIOD_HOURS: u64 = 10 * 365 * 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Settings consumed by the resolution engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// URL of the full catalog document
    pub catalog_url: String,
    /// URL of the version document
    pub version_url: String,
    /// Cache directory; the platform cache directory when unset
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_cache_duration_hours")]
    pub cache_duration_hours: u64,
    #[serde(default = "default_true")]
    pub auto_update_enabled: bool,
    #[serde(default = "default_auto_update_interval_hours")]
    pub auto_update_interval_hours: u64,
    #[serde(default = "default_true")]
    pub prefer_checksum_matching: bool,
    #[serde(default = "default_true")]
    pub enable_poster_download: bool,
    #[serde(default = "default_version_timeout_secs")]
    pub version_timeout_secs: u64,
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,
    #[serde(default = "default_failure_backoff_minutes")]
    pub failure_backoff_minutes: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_duration_hours() -> u64 {
    24
}

fn default_auto_update_interval_hours() -> u64 {
    24
}

fn default_version_timeout_secs() -> u64 {
    5
}

fn default_catalog_timeout_secs() -> u64 {
    30
}

fn default_failure_backoff_minutes() -> u64 {
    5
}

impl Settings {
    /// Checks values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("catalog_url", &self.catalog_url),
            ("version_url", &self.version_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }

        if self.version_timeout_secs == 0 || self.catalog_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request timeouts must be greater than zero".to_string(),
            ));
        }

        if self.version_timeout_secs >= self.catalog_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "version_timeout_secs ({}) must be shorter than catalog_timeout_secs ({})",
                self.version_timeout_secs, self.catalog_timeout_secs
            )));
        }

        for (name, value, max) in [
            ("cache_duration_hours", self.cache_duration_hours, MAX_PERIOD_HOURS),
            (
                "auto_update_interval_hours",
                self.auto_update_interval_hours,
                MAX_PERIOD_HOURS,
            ),
            (
                "failure_backoff_minutes",
                self.failure_backoff_minutes,
                MAX_PERIOD_HOURS * 60,
            ),
        ] {
            if value > max {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be at most {max}, got {value}"
                )));
            }
        }

        if self.auto_update_enabled && self.auto_update_interval_hours == 0 {
            return Err(ConfigError::ValidationError(
                "auto_update_interval_hours must be greater than zero when auto update is enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            cache_duration: hours(self.cache_duration_hours),
            failure_backoff: Duration::from_secs(self.failure_backoff_minutes.saturating_mul(60)),
        }
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            catalog_url: self.catalog_url.clone(),
            version_url: self.version_url.clone(),
            version_timeout: Duration::from_secs(self.version_timeout_secs),
            catalog_timeout: Duration::from_secs(self.catalog_timeout_secs),
        }
    }

    /// Interval for the periodic refresh, `None` when auto update is off
    pub fn auto_update_interval(&self) -> Option<Duration> {
        self.auto_update_enabled
            .then(|| hours(self.auto_update_interval_hours))
    }
}

fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60 * 60))
}

/// Load settings from an optional file with environment variable overrides
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let settings: Settings = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}

/// Load settings from a TOML string (useful for testing)
pub fn load_settings_from_str(toml_str: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = Figment::from(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
catalog_url = "https://example.org/data.json"
version_url = "https://example.org/status.json"
"#;

    #[test]
    fn test_defaults() {
        let settings = load_settings_from_str(MINIMAL).unwrap();

        assert_eq!(settings.cache_duration_hours, 24);
        assert!(settings.auto_update_enabled);
        assert!(settings.prefer_checksum_matching);
        assert!(settings.enable_poster_download);
        assert_eq!(settings.cache_dir, None);

        let http = settings.http_source_config();
        assert!(http.version_timeout < http.catalog_timeout);

        let options = settings.resolver_options();
        assert_eq!(options.cache_duration, Duration::from_secs(24 * 3600));
        assert_eq!(options.failure_backoff, Duration::from_secs(300));
        assert_eq!(
            settings.auto_update_interval(),
            Some(Duration::from_secs(24 * 3600))
        );
    }

    #[test]
    fn test_missing_urls_fail() {
        let result = load_settings_from_str("cache_duration_hours = 1");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_url_fails_validation() {
        let toml = r#"
catalog_url = "ftp://example.org/data.json"
version_url = "https://example.org/status.json"
"#;
        let result = load_settings_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_interval_with_auto_update_fails() {
        let toml = format!("{MINIMAL}\nauto_update_interval_hours = 0\n");
        let result = load_settings_from_str(&toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let toml = format!("{MINIMAL}\nauto_update_interval_hours = 0\nauto_update_enabled = false\n");
        let settings = load_settings_from_str(&toml).unwrap();
        assert_eq!(settings.auto_update_interval(), None);
    }

    #[test]
    fn test_version_timeout_must_be_shorter() {
        let toml = format!("{MINIMAL}\nversion_timeout_secs = 60\ncatalog_timeout_secs = 30\n");
        let result = load_settings_from_str(&toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let toml = format!("{MINIMAL}\nversion_timeout_secs = 30\ncatalog_timeout_secs = 30\n");
        let result = load_settings_from_str(&toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_huge_periods_fail_validation() {
        for key in [
            "cache_duration_hours",
            "auto_update_interval_hours",
            "failure_backoff_minutes",
        ] {
            let toml = format!("{MINIMAL}\n{key} = 9223372036854775807\n");
            let result = load_settings_from_str(&toml);
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_ten_year_interval_is_accepted() {
        let toml = format!("{MINIMAL}\nauto_update_interval_hours = 87600\n");
        let settings = load_settings_from_str(&toml).unwrap();
        assert_eq!(
            settings.auto_update_interval(),
            Some(Duration::from_secs(87600 * 3600))
        );
    }

    #[test]
    fn test_load_settings_file_not_found() {
        let result = load_settings(Some(Path::new("/nonexistent/pace-metadata.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"{MINIMAL}
cache_dir = "/tmp/pace-cache"
prefer_checksum_matching = false
"#
        )
        .unwrap();

        let settings = load_settings(Some(temp_file.path())).unwrap();
        assert_eq!(settings.cache_dir, Some(PathBuf::from("/tmp/pace-cache")));
        assert!(!settings.prefer_checksum_matching);
    }
}
