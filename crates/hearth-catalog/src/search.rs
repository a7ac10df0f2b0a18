//! Conjunctive substring search over catalog entries.
//!
//! Every query token must appear in at least one searchable field of an entry.
//! A token also matches with its digits removed, so "llama 3" finds
//! "llama3:8b". Results keep source order; nothing is ranked.

use crate::entry::CatalogEntry;

/// Lowercase and keep only alphanumeric characters.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a query on whitespace into normalized, non-empty tokens.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(normalize)
        .filter(|t| !t.is_empty())
        .collect()
}

fn searchable_fields(entry: &CatalogEntry) -> [String; 4] {
    let spaced: String = entry
        .id
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();

    [
        normalize(&entry.id),
        normalize(entry.base_name()),
        spaced,
        normalize(&entry.description),
    ]
}

/// Whether `entry` matches every token.
pub fn matches(entry: &CatalogEntry, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }

    let fields = searchable_fields(entry);
    tokens.iter().all(|token| {
        let stripped: String = token.chars().filter(|c| !c.is_ascii_digit()).collect();
        fields.iter().any(|field| {
            field.contains(token.as_str()) || (!stripped.is_empty() && field.contains(&stripped))
        })
    })
}

/// Entries matching `query`, in their original order, at most `limit`.
pub fn search_entries(entries: &[CatalogEntry], query: &str, limit: usize) -> Vec<CatalogEntry> {
    let tokens = tokenize(query);
    entries
        .iter()
        .filter(|entry| matches(entry, &tokens))
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CatalogSource;

    fn entry(id: &str, description: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            description: description.to_string(),
            size_bytes: None,
            likes: 0,
            downloads: 0,
            works_locally: true,
            source: CatalogSource::Static,
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            entry("llama3:8b", "Meta's open model"),
            entry("mistral:7b", "The 7B model released by Mistral AI"),
            entry("codellama:13b", "A large language model for code"),
            entry("deepseek-r1:1.5b", "Reasoning model"),
        ]
    }

    fn ids(results: &[CatalogEntry]) -> Vec<&str> {
        results.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_digit_tolerant_and_conjunctive() {
        let results = search_entries(&catalog(), "llama 3", 10);
        assert!(ids(&results).contains(&"llama3:8b"));
        assert!(!ids(&results).contains(&"mistral:7b"));
    }

    #[test]
    fn test_every_token_must_match() {
        assert_eq!(ids(&search_entries(&catalog(), "llama code", 10)), vec!["codellama:13b"]);
        assert!(search_entries(&catalog(), "llama mistral", 10).is_empty());
    }

    #[test]
    fn test_version_variance() {
        // "llama3" also matches with digits removed
        let results = search_entries(&catalog(), "llama3", 10);
        assert_eq!(ids(&results), vec!["llama3:8b", "codellama:13b"]);
    }

    #[test]
    fn test_separators_and_case() {
        assert_eq!(ids(&search_entries(&catalog(), "DeepSeek-R1", 10)), vec!["deepseek-r1:1.5b"]);
        assert_eq!(ids(&search_entries(&catalog(), "r1 1.5", 10)), vec!["deepseek-r1:1.5b"]);
    }

    #[test]
    fn test_empty_query_matches_all_in_order() {
        let results = search_entries(&catalog(), "   ", 3);
        assert_eq!(ids(&results), vec!["llama3:8b", "mistral:7b", "codellama:13b"]);
    }

    #[test]
    fn test_description_is_searched() {
        assert_eq!(ids(&search_entries(&catalog(), "reasoning", 10)), vec!["deepseek-r1:1.5b"]);
    }

    #[test]
    fn test_punctuated_description_matches() {
        let entries = vec![
            entry("phi3:mini", "A state-of-the-art open-source model"),
            entry("mistral:7b", "Released under Apache 2.0"),
        ];
        assert_eq!(ids(&search_entries(&entries, "open-source", 10)), vec!["phi3:mini"]);
        assert_eq!(ids(&search_entries(&entries, "state of the art", 10)), vec!["phi3:mini"]);
        assert_eq!(ids(&search_entries(&entries, "apache 2.0", 10)), vec!["mistral:7b"]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Llama-3.1:8B"), "llama318b");
        assert_eq!(tokenize(" llama  -  3 "), vec!["llama", "3"]);
    }
}
