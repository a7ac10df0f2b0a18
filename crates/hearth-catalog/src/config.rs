//! Catalog configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_HUB_URL;

/// Configuration for catalog resolution.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL of the model hub
    pub hub_url: String,
    /// Timeout for one hub request
    pub timeout: Duration,
    /// Where the last good catalog is persisted (None disables the snapshot)
    pub cache_path: Option<PathBuf>,
    /// How long a resolved catalog is reused without refetching
    pub ttl: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            timeout: Duration::from_secs(15),
            cache_path: default_cache_path(),
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CatalogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let hub_url = std::env::var("HEARTH_HUB_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.hub_url);

        let timeout = std::env::var("HEARTH_CATALOG_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let cache_path = std::env::var("HEARTH_CATALOG_CACHE")
            .map(PathBuf::from)
            .ok()
            .or(defaults.cache_path);

        let ttl = std::env::var("HEARTH_CATALOG_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ttl);

        Self {
            hub_url,
            timeout,
            cache_path,
            ttl,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::default()
    }
}

fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("hearth").join("catalog.json"))
}

/// Builder for catalog configuration.
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    pub fn hub_url(mut self, url: impl Into<String>) -> Self {
        self.config.hub_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    pub fn no_cache_file(mut self) -> Self {
        self.config.cache_path = None;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn build(self) -> CatalogConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.hub_url, "https://ollama.com");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_builder() {
        let config = CatalogConfig::builder()
            .hub_url("http://localhost:1234/")
            .ttl(Duration::ZERO)
            .no_cache_file()
            .build();
        assert_eq!(config.hub_url, "http://localhost:1234");
        assert_eq!(config.ttl, Duration::ZERO);
        assert!(config.cache_path.is_none());
    }
}
