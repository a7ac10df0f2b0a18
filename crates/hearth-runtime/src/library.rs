//! Listing and removing models in the runtime's local store.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::RuntimeApi;
use crate::error::RuntimeError;
use crate::models::{DeleteAllReport, InstalledModel, OnStatus};

/// Installed-model operations over the runtime API.
#[derive(Clone)]
pub struct ModelLibrary {
    api: Arc<dyn RuntimeApi>,
}

impl ModelLibrary {
    pub fn new(api: Arc<dyn RuntimeApi>) -> Self {
        Self { api }
    }

    /// Models the runtime holds right now.
    pub async fn list_installed(&self) -> Result<Vec<InstalledModel>, RuntimeError> {
        self.api.list_models().await
    }

    /// Delete one model. Failures are logged and reported as `false`.
    pub async fn delete_model(&self, name: &str) -> bool {
        match self.api.delete(name).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete model {}: {}", name, e);
                false
            }
        }
    }

    /// Delete every installed model, one at a time.
    ///
    /// Only a failure to enumerate is an error; per-model failures are
    /// collected in the report and the remaining models are still deleted.
    pub async fn delete_all(&self, on_status: OnStatus<'_>) -> Result<DeleteAllReport, RuntimeError> {
        let models = self.list_installed().await?;
        let mut report = DeleteAllReport::default();

        if models.is_empty() {
            on_status("No models installed");
            return Ok(report);
        }

        let total = models.len();
        for (index, model) in models.into_iter().enumerate() {
            on_status(&format!("Deleting {} ({}/{})", model.name, index + 1, total));
            if self.delete_model(&model.name).await {
                report.deleted.push(model.name);
            } else {
                on_status(&format!("Could not delete {}, skipping", model.name));
                report.failed.push(model.name);
            }
        }

        info!(
            "Deleted {} models, {} failed",
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
