use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{fetch_text, CatalogTier};
use crate::config::CatalogConfig;
use crate::entry::{entries_from_records, CatalogEntry, CatalogSource};
use crate::error::CatalogError;

/// A hub endpoint that returns model records as JSON.
///
/// The records are either the top-level array or an array under one of the
/// configured envelope keys, possibly one object deep (`{"data": {"models": [...]}}`).
pub struct StructuredSource {
    name: &'static str,
    url: String,
    envelopes: &'static [&'static str],
    source: CatalogSource,
    client: reqwest::Client,
    timeout: Duration,
}

impl StructuredSource {
    /// The bulk model listing.
    pub fn primary(config: &CatalogConfig) -> Self {
        Self {
            name: "primary",
            url: format!("{}/api/models", config.hub_url),
            envelopes: &["models"],
            source: CatalogSource::Primary,
            client: reqwest::Client::new(),
            timeout: config.timeout,
        }
    }

    /// The search endpoint with an empty query, a different envelope shape.
    pub fn secondary(config: &CatalogConfig) -> Self {
        Self {
            name: "secondary",
            url: format!("{}/api/search?q=", config.hub_url),
            envelopes: &["data", "items", "results", "models"],
            source: CatalogSource::Fallback,
            client: reqwest::Client::new(),
            timeout: config.timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn records<'a>(&self, body: &'a Value) -> Option<&'a Vec<Value>> {
        if let Some(array) = body.as_array() {
            return Some(array);
        }
        let object = body.as_object()?;
        self.envelopes.iter().find_map(|key| match object.get(*key)? {
            Value::Array(array) => Some(array),
            Value::Object(inner) => self
                .envelopes
                .iter()
                .find_map(|key| inner.get(*key).and_then(Value::as_array)),
            _ => None,
        })
    }
}

#[async_trait]
impl CatalogTier for StructuredSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let text = fetch_text(&self.client, &self.url, self.timeout).await?;
        let body: Value = serde_json::from_str(&text)?;
        let records = self
            .records(&body)
            .ok_or_else(|| CatalogError::NoRecords(self.url.clone()))?;
        Ok(entries_from_records(records, self.source))
    }
}
