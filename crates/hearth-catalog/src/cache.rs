//! Catalog caching: a short-lived in-memory copy and an on-disk snapshot of
//! the last catalog that came from the network.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::CatalogEntry;
use crate::error::CatalogError;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    version: u32,
    /// Seconds since the Unix epoch
    saved_at: u64,
    entries: Vec<CatalogEntry>,
}

/// Cache for resolved catalogs.
pub struct CatalogCache {
    ttl: Duration,
    path: Option<PathBuf>,
    memory: Mutex<Option<(Instant, Vec<CatalogEntry>)>>,
}

impl CatalogCache {
    /// Create a cache. `path` of `None` keeps it memory-only.
    pub fn new(ttl: Duration, path: Option<PathBuf>) -> Self {
        Self {
            ttl,
            path,
            memory: Mutex::new(None),
        }
    }

    /// The in-memory catalog, if it is younger than the TTL.
    pub fn fresh(&self) -> Option<Vec<CatalogEntry>> {
        let memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        match memory.as_ref() {
            Some((stored_at, entries)) if stored_at.elapsed() < self.ttl => Some(entries.clone()),
            _ => None,
        }
    }

    /// Remember a freshly resolved catalog and persist it as the snapshot.
    pub fn store(&self, entries: &[CatalogEntry]) -> Result<(), CatalogError> {
        *self.memory.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), entries.to_vec()));

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            entries: entries.to_vec(),
        };
        fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(())
    }

    /// The last persisted catalog, regardless of age.
    ///
    /// Snapshots from another format version or that fail to parse are ignored.
    pub fn load_snapshot(&self) -> Option<Vec<CatalogEntry>> {
        let path = self.path.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION && !snapshot.entries.is_empty() => {
                Some(snapshot.entries)
            }
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring unreadable catalog snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Forget the in-memory catalog and delete the snapshot.
    pub fn clear(&self) -> Result<(), CatalogError> {
        *self.memory.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CatalogSource;
    use tempfile::tempdir;

    fn entries() -> Vec<CatalogEntry> {
        vec![CatalogEntry {
            id: "llama3.2:1b".to_string(),
            description: "small".to_string(),
            size_bytes: Some(1),
            likes: 2,
            downloads: 3,
            works_locally: true,
            source: CatalogSource::Primary,
        }]
    }

    #[test]
    fn test_fresh_within_ttl() {
        let cache = CatalogCache::new(Duration::from_secs(60), None);
        assert!(cache.fresh().is_none());
        cache.store(&entries()).unwrap();
        assert_eq!(cache.fresh(), Some(entries()));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let cache = CatalogCache::new(Duration::ZERO, None);
        cache.store(&entries()).unwrap();
        assert!(cache.fresh().is_none());
    }

    #[test]
    fn test_snapshot_survives_new_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        CatalogCache::new(Duration::ZERO, Some(path.clone()))
            .store(&entries())
            .unwrap();

        let reopened = CatalogCache::new(Duration::ZERO, Some(path));
        assert_eq!(reopened.load_snapshot(), Some(entries()));
    }

    #[test]
    fn test_corrupt_snapshot_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, "{not json").unwrap();
        assert!(CatalogCache::new(Duration::ZERO, Some(path.clone())).load_snapshot().is_none());

        fs::write(&path, r#"{"version": 99, "savedAt": 0, "entries": []}"#).unwrap();
        assert!(CatalogCache::new(Duration::ZERO, Some(path)).load_snapshot().is_none());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let cache = CatalogCache::new(Duration::from_secs(60), Some(path.clone()));
        cache.store(&entries()).unwrap();

        cache.clear().unwrap();
        assert!(cache.fresh().is_none());
        assert!(!path.exists());
        // clearing twice is fine
        cache.clear().unwrap();
    }
}
