use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexSet;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{fetch_text, CatalogTier};
use crate::config::CatalogConfig;
use crate::entry::{entries_from_records, is_record, CatalogEntry, CatalogSource};
use crate::error::CatalogError;

/// How deep the embedded blob is searched for a record array.
const MAX_DEPTH: usize = 32;

fn script_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").ok())
        .as_ref()
}

fn library_link_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"href="/library/([A-Za-z0-9._-]+)""#).ok())
        .as_ref()
}

/// Last network resort: the hub's HTML library page.
///
/// The page layout is not a contract, so the first JSON blob inside a
/// `<script>` that contains an array of record-like objects wins, wherever it
/// is nested. Without one, the model links on the page are used as bare entries.
pub struct ScrapeSource {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ScrapeSource {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            url: format!("{}/library", config.hub_url),
            client: reqwest::Client::new(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl CatalogTier for ScrapeSource {
    fn name(&self) -> &str {
        "scrape"
    }

    async fn fetch(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let html = fetch_text(&self.client, &self.url, self.timeout).await?;
        let entries = entries_from_html(&html);
        if entries.is_empty() {
            return Err(CatalogError::NoRecords(self.url.clone()));
        }
        Ok(entries)
    }
}

/// Extract entries from the library page.
pub fn entries_from_html(html: &str) -> Vec<CatalogEntry> {
    if let Some(records) = embedded_records(html) {
        let entries = entries_from_records(&records, CatalogSource::Fallback);
        if !entries.is_empty() {
            return entries;
        }
    }

    debug!("No embedded model data, falling back to library links");
    let Some(pattern) = library_link_pattern() else {
        return Vec::new();
    };
    let names: IndexSet<&str> = pattern
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();
    let records: Vec<Value> = names
        .into_iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    entries_from_records(&records, CatalogSource::Fallback)
}

fn embedded_records(html: &str) -> Option<Vec<Value>> {
    let pattern = script_pattern()?;
    pattern
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .filter_map(|body| parse_blob(body.as_str()))
        .find_map(|blob| find_record_array(&blob, 0).cloned())
}

/// Parse the first JSON value starting at the first `{` or `[` of a script body.
fn parse_blob(script: &str) -> Option<Value> {
    let start = script.find(['{', '['])?;
    serde_json::Deserializer::from_str(&script[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Depth-first search for the first non-empty array whose elements all look like records.
fn find_record_array(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Array(items) => {
            if !items.is_empty() && items.iter().all(is_record) {
                return Some(items);
            }
            items.iter().find_map(|item| find_record_array(item, depth + 1))
        }
        Value::Object(map) => map.values().find_map(|v| find_record_array(v, depth + 1)),
        _ => None,
    }
}
