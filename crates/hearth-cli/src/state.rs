//! Hearth's own local state, cleared by `hearth reset`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hearth_runtime::AppStateStore;
use tracing::debug;

/// File name of the marker that makes the next launch start onboarding.
const ONBOARDING_FLAG: &str = "onboarding-required";

/// App state kept in plain directories.
pub(crate) struct FileStateStore {
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl FileStateStore {
    pub(crate) fn new(cache_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// The platform cache and data directories, under `hearth/`.
    pub(crate) fn default_location() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(std::env::temp_dir).join("hearth");
        Self::new(base(dirs::cache_dir()), base(dirs::data_dir()))
    }

    pub(crate) fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub(crate) fn onboarding_flag(&self) -> PathBuf {
        self.data_dir.join(ONBOARDING_FLAG)
    }
}

#[async_trait]
impl AppStateStore for FileStateStore {
    async fn clear_local_state(&self) -> io::Result<()> {
        debug!("Removing {}", self.cache_dir.display());
        match tokio::fs::remove_dir_all(&self.cache_dir).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    async fn request_onboarding(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(self.onboarding_flag(), b"1\n").await
    }
}
