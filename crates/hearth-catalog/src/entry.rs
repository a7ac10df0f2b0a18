//! Catalog entries and the normalization of raw hub records into them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::size::{parse_count, parse_parameter_count, parse_size};

/// Which tier of the fallback chain produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Primary,
    Fallback,
    Static,
}

/// One browsable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Unique identifier within one resolved catalog (e.g., "llama3.1:8b")
    pub id: String,
    pub description: String,
    /// Download size in bytes; `None` when unknown
    pub size_bytes: Option<u64>,
    pub likes: u64,
    pub downloads: u64,
    /// Whether the model runs on this machine's runtime rather than a hosted service
    pub works_locally: bool,
    pub source: CatalogSource,
}

impl CatalogEntry {
    /// Part of the id before the tag separator.
    pub fn base_name(&self) -> &str {
        self.id.split(':').next().unwrap_or(&self.id)
    }
}

/// Field names that identify a model record.
const NAME_FIELDS: &[&str] = &["name", "id", "model", "slug"];

const DESCRIPTION_FIELDS: &[&str] = &["description", "summary", "desc"];
const SIZE_FIELDS: &[&str] = &["size", "size_bytes", "sizeBytes", "file_size", "fileSize"];
const PARAMETER_FIELDS: &[&str] = &["parameter_size", "parameterSize", "parameters", "params"];
const DOWNLOAD_FIELDS: &[&str] = &["downloads", "pulls", "pull_count", "pullCount"];
const LIKE_FIELDS: &[&str] = &["likes", "stars", "hearts"];
const LOCAL_FIELDS: &[&str] = &["works_locally", "worksLocally", "local"];
const TAG_FIELDS: &[&str] = &["tags", "sizes"];

/// Whether a JSON value looks like a model record.
pub(crate) fn is_record(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |obj| record_name(obj).is_some())
}

fn record_name(obj: &Map<String, Value>) -> Option<&str> {
    NAME_FIELDS
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Hosted-only models are listed by the hub but never run locally.
fn is_cloud_only(id: &str) -> bool {
    let id = id.to_ascii_lowercase();
    id.ends_with(":cloud") || id.ends_with("-cloud")
}

/// Convert raw records into entries, skipping anything without a name.
///
/// A record listing its tags (`"tags": ["1b", "3b"]`) becomes one entry per
/// tag, with the size estimated from the tag when it is a parameter count.
pub fn entries_from_records(records: &[Value], source: CatalogSource) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();

    for obj in records.iter().filter_map(Value::as_object) {
        let Some(name) = record_name(obj) else {
            continue;
        };

        let description = first(obj, DESCRIPTION_FIELDS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let downloads = first(obj, DOWNLOAD_FIELDS).and_then(parse_count).unwrap_or(0);
        let likes = first(obj, LIKE_FIELDS).and_then(parse_count).unwrap_or(0);
        let local_flag = first(obj, LOCAL_FIELDS).and_then(Value::as_bool);

        let explicit_size = first(obj, SIZE_FIELDS).and_then(parse_size).or_else(|| {
            first(obj, PARAMETER_FIELDS)
                .and_then(Value::as_str)
                .and_then(parse_parameter_count)
        });

        let tags: Vec<&str> = first(obj, TAG_FIELDS)
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let ids: Vec<String> = if tags.is_empty() || name.contains(':') {
            vec![name.to_string()]
        } else {
            tags.iter().map(|tag| format!("{}:{}", name, tag)).collect()
        };
        let expanded = ids.len() > 1;

        for id in ids {
            let tag_size = id.split_once(':').and_then(|(_, tag)| parse_parameter_count(tag));
            let size_bytes = if expanded {
                tag_size
            } else {
                explicit_size.or(tag_size)
            };

            entries.push(CatalogEntry {
                works_locally: local_flag.unwrap_or_else(|| !is_cloud_only(&id)),
                id,
                description: description.clone(),
                size_bytes,
                likes,
                downloads,
                source,
            });
        }
    }

    entries
}
