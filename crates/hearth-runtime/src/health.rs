//! Single-shot liveness check against the runtime's local API.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Answers "is the runtime answering right now?".
///
/// Implementations collapse every failure (refused, timeout, bad status) into `false`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> bool;
}

/// Probe that issues `GET {base}/api/version` with a timeout.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/version", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn ping(&self) -> bool {
        ping_with(&self.client, &self.endpoint, self.timeout).await
    }
}

/// One-off probe of `endpoint`.
pub async fn ping(endpoint: &str, timeout: Duration) -> bool {
    ping_with(&reqwest::Client::new(), endpoint, timeout).await
}

async fn ping_with(client: &reqwest::Client, endpoint: &str, timeout: Duration) -> bool {
    match client.get(endpoint).timeout(timeout).send().await {
        Ok(response) => {
            let healthy = response.status().is_success();
            debug!("Health probe {} -> {}", endpoint, response.status());
            healthy
        }
        Err(e) => {
            debug!("Health probe {} failed: {}", endpoint, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/version")
            .with_status(200)
            .with_body(r#"{"version":"0.5.7"}"#)
            .create_async()
            .await;

        let probe = HttpHealthProbe::new(&server.url(), Duration::from_secs(2));
        assert!(probe.ping().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_error_status_is_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/version")
            .with_status(500)
            .create_async()
            .await;

        let probe = HttpHealthProbe::new(&server.url(), Duration::from_secs(2));
        assert!(!probe.ping().await);
    }

    #[tokio::test]
    async fn test_ping_refused_is_unhealthy() {
        // Port 9 (discard) is closed on test machines.
        assert!(!ping("http://127.0.0.1:9/api/version", Duration::from_millis(500)).await);
    }

    #[test]
    fn test_endpoint_shape() {
        let probe = HttpHealthProbe::new("http://127.0.0.1:11434/", Duration::from_secs(1));
        assert_eq!(probe.endpoint(), "http://127.0.0.1:11434/api/version");
    }
}
