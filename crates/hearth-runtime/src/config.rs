//! Runtime configuration.

use std::time::Duration;

use crate::DEFAULT_RUNTIME_URL;

/// Configuration for talking to and supervising the local runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Base URL of the runtime's local API
    pub base_url: String,
    /// Timeout for a single health probe
    pub probe_timeout: Duration,
    /// Total time to wait for the runtime to answer after a start attempt
    pub start_timeout: Duration,
    /// Interval between health probes while waiting
    pub poll_interval: Duration,
    /// Interval between "still waiting" status messages
    pub status_interval: Duration,
    /// How long a service-manager start is trusted before falling back to direct launch
    pub service_grace: Duration,
    /// Delay before verifying an install
    pub settle_delay: Duration,
    /// Upper bound for one installer / package-manager process
    pub install_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RUNTIME_URL.to_string(),
            probe_timeout: Duration::from_millis(2000),
            start_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1000),
            status_interval: Duration::from_secs(5),
            service_grace: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
            install_timeout: Duration::from_secs(900),
        }
    }
}

impl RuntimeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("HEARTH_RUNTIME_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        Self {
            base_url,
            probe_timeout: env_duration("HEARTH_PROBE_TIMEOUT_MS", Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
            start_timeout: env_duration("HEARTH_START_TIMEOUT_SECS", Duration::from_secs)
                .unwrap_or(defaults.start_timeout),
            poll_interval: env_duration("HEARTH_POLL_INTERVAL_MS", Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            service_grace: env_duration("HEARTH_SERVICE_GRACE_SECS", Duration::from_secs)
                .unwrap_or(defaults.service_grace),
            install_timeout: env_duration("HEARTH_INSTALL_TIMEOUT_SECS", Duration::from_secs)
                .unwrap_or(defaults.install_timeout),
            ..defaults
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

fn env_duration(key: &str, unit: fn(u64) -> Duration) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(unit)
}

/// Builder for runtime configuration.
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.config.start_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.config.status_interval = interval;
        self
    }

    pub fn service_grace(mut self, grace: Duration) -> Self {
        self.config.service_grace = grace;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn install_timeout(mut self, timeout: Duration) -> Self {
        self.config.install_timeout = timeout;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}
