//! HTTP client for the runtime's local model API.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::RuntimeError;
use crate::models::InstalledModel;
use crate::DEFAULT_RUNTIME_URL;

/// Timeout for non-streaming API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Newline-delimited records of a streaming response, one line per item.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, RuntimeError>> + Send>>;

/// The subset of the runtime API the core relies on.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Models currently in the runtime's local store.
    async fn list_models(&self) -> Result<Vec<InstalledModel>, RuntimeError>;

    /// Start a pull and return its raw progress records.
    async fn pull(&self, model: &str) -> Result<LineStream, RuntimeError>;

    /// Remove a model from the local store.
    async fn delete(&self, model: &str) -> Result<(), RuntimeError>;
}

/// Response from the tags (list models) endpoint.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<InstalledModel>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Client for the runtime's HTTP API.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    client: reqwest::Client,
    base_url: String,
}

impl RuntimeClient {
    /// Create a new client with the default local URL.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_RUNTIME_URL)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Version string reported by the runtime.
    pub async fn version(&self) -> Result<String, RuntimeError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response).await?;
        let version: VersionResponse = response.json().await?;
        Ok(version.version)
    }

    fn map_send_error(&self, e: reqwest::Error) -> RuntimeError {
        if e.is_connect() {
            RuntimeError::NotReachable(self.base_url.clone())
        } else {
            RuntimeError::Http(e)
        }
    }
}

impl Default for RuntimeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeApi for RuntimeClient {
    async fn list_models(&self) -> Result<Vec<InstalledModel>, RuntimeError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response).await?;

        let tags: TagsResponse = response.json().await?;
        debug!("Runtime lists {} models", tags.models.len());
        Ok(tags.models)
    }

    async fn pull(&self, model: &str) -> Result<LineStream, RuntimeError> {
        validate_name(model)?;
        info!("Pulling model: {}", model);

        let url = format!("{}/api/pull", self.base_url);
        // Older runtimes read `name`, newer ones `model`.
        let body = serde_json::json!({ "model": model, "name": model, "stream": true });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response).await?;

        Ok(ndjson_lines(response.bytes_stream()))
    }

    async fn delete(&self, model: &str) -> Result<(), RuntimeError> {
        validate_name(model)?;
        debug!("Removing model: {}", model);

        let url = format!("{}/api/delete", self.base_url);
        let body = serde_json::json!({ "model": model, "name": model });

        let response = self
            .client
            .delete(&url)
            .json(&body)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        check_status(response).await?;

        info!("Removed model: {}", model);
        Ok(())
    }
}

fn validate_name(model: &str) -> Result<(), RuntimeError> {
    if model.trim().is_empty() {
        return Err(RuntimeError::InvalidModelName(
            "Model name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RuntimeError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    error!("Runtime returned {}: {}", status, text);
    Err(RuntimeError::Api(format!("{}: {}", status, text)))
}

/// Split a byte stream into trimmed, non-empty lines.
///
/// A transport error is yielded once and ends the stream.
pub fn ndjson_lines<S, B, E>(bytes: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<RuntimeError> + Send + 'static,
{
    let state = (Box::pin(bytes), Vec::<u8>::new(), false);

    Box::pin(futures_util::stream::unfold(
        state,
        |(mut inner, mut buf, mut done)| async move {
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let text = String::from_utf8_lossy(&line).trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    return Some((Ok(text), (inner, buf, done)));
                }

                if done {
                    let text = String::from_utf8_lossy(&buf).trim().to_string();
                    buf.clear();
                    if text.is_empty() {
                        return None;
                    }
                    return Some((Ok(text), (inner, buf, done)));
                }

                match inner.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        done = true;
                        buf.clear();
                        return Some((Err(e.into()), (inner, buf, done)));
                    }
                    None => done = true,
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_default_url() {
        let client = RuntimeClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_custom_url() {
        let client = RuntimeClient::with_url("http://192.168.1.100:8080/");
        assert_eq!(client.base_url(), "http://192.168.1.100:8080");
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let chunks: Vec<Result<&'static [u8], RuntimeError>> = vec![
            Ok(b"{\"status\":\"pulling".as_slice()),
            Ok(b" manifest\"}\n\n{\"status\":".as_slice()),
            Ok(b"\"success\"}".as_slice()),
        ];
        let lines: Vec<_> = ndjson_lines(stream::iter(chunks)).collect().await;
        let lines: Vec<String> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            lines,
            vec![
                r#"{"status":"pulling manifest"}"#.to_string(),
                r#"{"status":"success"}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let chunks: Vec<Result<&'static [u8], RuntimeError>> = vec![
            Ok(b"{\"status\":\"a\"}\n{\"sta".as_slice()),
            Err(RuntimeError::Api("reset".into())),
            Ok(b"never seen\n".as_slice()),
        ];
        let items: Vec<_> = ndjson_lines(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_version() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/version")
            .with_status(200)
            .with_body(r#"{"version":"0.5.7"}"#)
            .create_async()
            .await;

        let client = RuntimeClient::with_url(server.url());
        assert_eq!(client.version().await.unwrap(), "0.5.7");
    }

    #[tokio::test]
    async fn test_list_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(
                r#"{"models":[{"name":"llama3.2:1b","size":1321098329,"digest":"baf6a787"},{"name":"mistral:latest"}]}"#,
            )
            .create_async()
            .await;

        let client = RuntimeClient::with_url(server.url());
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "llama3.2:1b");
        assert_eq!(models[0].size, Some(1_321_098_329));
        assert_eq!(models[1].size, None);
    }

    #[tokio::test]
    async fn test_pull_streams_lines() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/pull")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"model": "llama3.2:1b", "stream": true}),
            ))
            .with_status(200)
            .with_body("{\"status\":\"pulling manifest\"}\n{\"status\":\"success\"}\n")
            .create_async()
            .await;

        let client = RuntimeClient::with_url(server.url());
        let lines: Vec<_> = client.pull("llama3.2:1b").await.unwrap().collect().await;
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_not_found_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/delete")
            .with_status(404)
            .with_body(r#"{"error":"model not found"}"#)
            .create_async()
            .await;

        let client = RuntimeClient::with_url(server.url());
        let err = client.delete("ghost").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Api(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let client = RuntimeClient::new();
        assert!(matches!(
            client.delete(" ").await,
            Err(RuntimeError::InvalidModelName(_))
        ));
    }
}
