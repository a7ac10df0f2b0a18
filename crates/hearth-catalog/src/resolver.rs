//! Catalog resolution through the fallback chain.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::CatalogCache;
use crate::config::CatalogConfig;
use crate::entry::CatalogEntry;
use crate::search::search_entries;
use crate::sources::{static_catalog, CatalogTier, ScrapeSource, StructuredSource};

/// Resolves the browsable model catalog.
///
/// Network tiers are tried in order and the first one that yields any entry
/// provides the whole catalog; tiers are never merged. When all of them fail
/// the last snapshot is served, then the bundled static list. Resolution never
/// fails from the caller's point of view.
pub struct CatalogResolver {
    tiers: Vec<Arc<dyn CatalogTier>>,
    cache: CatalogCache,
}

impl CatalogResolver {
    /// Create a resolver with the standard hub tiers.
    pub fn new(config: CatalogConfig) -> Self {
        let tiers: Vec<Arc<dyn CatalogTier>> = vec![
            Arc::new(StructuredSource::primary(&config)),
            Arc::new(StructuredSource::secondary(&config)),
            Arc::new(ScrapeSource::new(&config)),
        ];
        let cache = CatalogCache::new(config.ttl, config.cache_path.clone());
        Self::with_tiers(tiers, cache)
    }

    /// Create a resolver over explicit tiers.
    pub fn with_tiers(tiers: Vec<Arc<dyn CatalogTier>>, cache: CatalogCache) -> Self {
        Self { tiers, cache }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// The full deduplicated catalog in source order.
    pub async fn resolve(&self) -> Vec<CatalogEntry> {
        if let Some(entries) = self.cache.fresh() {
            debug!("Serving catalog from memory ({} entries)", entries.len());
            return entries;
        }

        for tier in &self.tiers {
            match tier.fetch().await {
                Ok(entries) if !entries.is_empty() => {
                    let entries = dedup(entries);
                    info!("Catalog resolved from {} tier ({} entries)", tier.name(), entries.len());
                    if let Err(e) = self.cache.store(&entries) {
                        warn!("Failed to save catalog snapshot: {}", e);
                    }
                    return entries;
                }
                Ok(_) => warn!("Catalog tier {} returned no entries", tier.name()),
                Err(e) => warn!("Catalog tier {} failed: {}", tier.name(), e),
            }
        }

        if let Some(entries) = self.cache.load_snapshot() {
            info!("All catalog tiers failed, serving saved snapshot");
            return dedup(entries);
        }

        info!("All catalog tiers failed, serving bundled list");
        dedup(static_catalog())
    }

    /// The `limit` most downloaded entries.
    pub async fn list_top(&self, limit: usize) -> Vec<CatalogEntry> {
        let mut entries = self.resolve().await;
        entries.sort_by(|a, b| b.downloads.cmp(&a.downloads));
        entries.truncate(limit);
        entries
    }

    /// Entries matching every token of `query`, in source order.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<CatalogEntry> {
        let entries = self.resolve().await;
        search_entries(&entries, query, limit)
    }
}

/// Key entries by id; the first occurrence wins.
fn dedup(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut by_id: IndexMap<String, CatalogEntry> = IndexMap::with_capacity(entries.len());
    for entry in entries {
        by_id.entry(entry.id.clone()).or_insert(entry);
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CatalogSource;
    use crate::error::CatalogError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeTier {
        name: &'static str,
        result: Option<Vec<(&'static str, u64)>>,
        calls: AtomicUsize,
    }

    impl FakeTier {
        fn ok(name: &'static str, entries: Vec<(&'static str, u64)>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Some(entries),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogTier for FakeTier {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entries = self
                .result
                .clone()
                .ok_or_else(|| CatalogError::NoRecords(self.name.to_string()))?;
            Ok(entries
                .into_iter()
                .map(|(id, downloads)| CatalogEntry {
                    id: id.to_string(),
                    description: format!("from {}", self.name),
                    size_bytes: None,
                    likes: 0,
                    downloads,
                    works_locally: true,
                    source: CatalogSource::Primary,
                })
                .collect())
        }
    }

    fn memory_cache() -> CatalogCache {
        CatalogCache::new(Duration::ZERO, None)
    }

    fn ids(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_tier_wins_and_dedups() {
        let primary = FakeTier::ok("primary", vec![("a", 1), ("b", 2), ("a", 3)]);
        let secondary = FakeTier::ok("secondary", vec![("c", 9)]);
        let resolver =
            CatalogResolver::with_tiers(vec![primary.clone(), secondary.clone()], memory_cache());

        let entries = resolver.resolve().await;
        assert_eq!(ids(&entries), vec!["a", "b"]);
        assert_eq!(entries[0].downloads, 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_failed_and_empty_tiers() {
        let primary = FakeTier::failing("primary");
        let secondary = FakeTier::ok("secondary", vec![]);
        let scrape = FakeTier::ok("scrape", vec![("x", 5), ("y", 6)]);
        let resolver = CatalogResolver::with_tiers(
            vec![primary.clone(), secondary.clone(), scrape.clone()],
            memory_cache(),
        );

        let entries = resolver.resolve().await;
        assert_eq!(ids(&entries), vec!["x", "y"]);
        assert!(entries.iter().all(|e| e.description == "from scrape"));
        assert_eq!((primary.calls(), secondary.calls(), scrape.calls()), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_offline_serves_static_list() {
        let resolver =
            CatalogResolver::with_tiers(vec![FakeTier::failing("primary")], memory_cache());
        let entries = resolver.resolve().await;
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|e| e.source == CatalogSource::Static));
    }

    #[tokio::test]
    async fn test_snapshot_served_before_static_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let online = CatalogResolver::with_tiers(
            vec![FakeTier::ok("primary", vec![("cached", 1)])],
            CatalogCache::new(Duration::ZERO, Some(path.clone())),
        );
        online.resolve().await;

        let offline = CatalogResolver::with_tiers(
            vec![FakeTier::failing("primary")],
            CatalogCache::new(Duration::ZERO, Some(path)),
        );
        assert_eq!(ids(&offline.resolve().await), vec!["cached"]);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let primary = FakeTier::ok("primary", vec![("a", 1)]);
        let resolver = CatalogResolver::with_tiers(
            vec![primary.clone()],
            CatalogCache::new(Duration::from_secs(60), None),
        );
        resolver.resolve().await;
        resolver.resolve().await;
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_list_top_orders_by_downloads() {
        let tier = FakeTier::ok("primary", vec![("low", 1), ("high", 100), ("mid", 50), ("tie", 50)]);
        let resolver = CatalogResolver::with_tiers(vec![tier], memory_cache());
        assert_eq!(ids(&resolver.list_top(3).await), vec!["high", "mid", "tie"]);
        assert!(resolver.list_top(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_keeps_source_order() {
        let tier = FakeTier::ok(
            "primary",
            vec![("llama3:8b", 1), ("mistral:7b", 100), ("codellama:7b", 50)],
        );
        let resolver = CatalogResolver::with_tiers(vec![tier], memory_cache());
        assert_eq!(ids(&resolver.search("llama", 10).await), vec!["llama3:8b", "codellama:7b"]);
        assert_eq!(resolver.search("", 10).await.len(), 3);
    }
}
