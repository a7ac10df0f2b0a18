//! Size and count normalization shared by every catalog tier.
//!
//! Sizes arrive as raw byte counts, human strings ("3.8 GB", "3.8GB") or only
//! as a parameter count ("7B"). Units are binary. A single-letter suffix glued
//! to the number is a parameter count and is turned into an estimated byte
//! size at [`BYTES_PER_PARAMETER`]; separated by a space ("100 B") it is a byte
//! unit. Anything that does not parse stays `None` so "unknown" is never
//! mistaken for "small".

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Estimated on-disk bytes per parameter for a typical 4-bit quantized model.
pub const BYTES_PER_PARAMETER: f64 = 0.6;

const KIB: f64 = 1024.0;

fn size_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)(\s*)([A-Za-z]*)$").ok())
        .as_ref()
}

fn count_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*([KkMmBb])?\b").ok())
        .as_ref()
}

/// Normalize a JSON size value to bytes.
pub fn parse_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => parse_size_str(s),
        _ => None,
    }
}

/// Normalize a size string to bytes.
///
/// ```
/// use hearth_catalog::size::parse_size_str;
/// assert_eq!(parse_size_str("1 KB"), Some(1024));
/// assert_eq!(parse_size_str("unknown"), None);
/// ```
pub fn parse_size_str(text: &str) -> Option<u64> {
    let text = text.trim();
    let caps = size_pattern()?.captures(text)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let spaced = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
    let unit = caps.get(3).map_or("", |m| m.as_str()).to_ascii_lowercase();

    let bytes = match unit.as_str() {
        "" | "byte" | "bytes" => number,
        "b" if spaced => number,
        "k" | "kb" | "kib" if spaced || unit != "k" => number * KIB,
        "m" | "mb" | "mib" if spaced || unit != "m" => number * KIB.powi(2),
        "g" | "gb" | "gib" => number * KIB.powi(3),
        "t" | "tb" | "tib" if spaced || unit != "t" => number * KIB.powi(4),
        // A magnitude glued to the number is a parameter count, not bytes.
        "k" | "m" | "b" | "t" => return parameters_to_bytes(number, &unit),
        _ => return None,
    };
    Some(bytes.round() as u64)
}

/// Estimate bytes from a parameter count like "7B" or "135M".
pub fn parse_parameter_count(text: &str) -> Option<u64> {
    let caps = size_pattern()?.captures(text.trim())?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(3).map_or("", |m| m.as_str()).to_ascii_lowercase();
    parameters_to_bytes(number, &unit)
}

fn parameters_to_bytes(number: f64, unit: &str) -> Option<u64> {
    let scale = match unit {
        "k" => 1e3,
        "m" => 1e6,
        "b" => 1e9,
        "t" => 1e12,
        _ => return None,
    };
    Some((number * scale * BYTES_PER_PARAMETER).round() as u64)
}

/// Normalize a download/like count ("1.2M", "35K", "1,234", 42) to an integer.
pub fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => parse_count_str(s),
        _ => None,
    }
}

pub fn parse_count_str(text: &str) -> Option<u64> {
    let cleaned = text.trim().replace(',', "");
    let caps = count_pattern()?.captures(&cleaned)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let scale = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1.0,
        Some(s) if s == "k" => 1e3,
        Some(s) if s == "m" => 1e6,
        Some(_) => 1e9,
    };
    Some((number * scale).round() as u64)
}
