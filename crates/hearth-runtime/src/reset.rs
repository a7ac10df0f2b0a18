//! The destructive "reset everything" flow.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::library::ModelLibrary;
use crate::models::{OnStatus, ResetOutcome};
use crate::supervisor::ServerSupervisor;
use crate::uninstall::Uninstaller;

/// Application state owned by the host app, outside this crate.
#[async_trait]
pub trait AppStateStore: Send + Sync {
    /// Drop cached application data.
    async fn clear_local_state(&self) -> std::io::Result<()>;

    /// Make the next launch start with first-run onboarding.
    async fn request_onboarding(&self) -> std::io::Result<()>;
}

/// Deletes models, uninstalls the runtime and clears app state, in that order.
pub struct LifecycleResetOrchestrator<'a> {
    library: &'a ModelLibrary,
    supervisor: &'a ServerSupervisor,
    uninstaller: &'a Uninstaller,
    state: &'a dyn AppStateStore,
}

impl<'a> LifecycleResetOrchestrator<'a> {
    pub fn new(
        library: &'a ModelLibrary,
        supervisor: &'a ServerSupervisor,
        uninstaller: &'a Uninstaller,
        state: &'a dyn AppStateStore,
    ) -> Self {
        Self {
            library,
            supervisor,
            uninstaller,
            state,
        }
    }

    /// Run all four stages.
    ///
    /// Only a failure to enumerate installed models stops the flow, and it
    /// does so before the runtime is touched so undeleted model data stays
    /// recoverable. Every later stage is best effort.
    pub async fn reset_everything(&self, on_status: OnStatus<'_>) -> ResetOutcome {
        let mut problems = Vec::new();

        on_status("Removing installed models...");
        // A runtime that answers is asked for its models even when its binary
        // lives somewhere the locator does not know about.
        let reachable = self.supervisor.ensure_running(on_status).await;
        if reachable || self.supervisor.locator().find_runtime_executable().is_some() {
            match self.library.delete_all(on_status).await {
                Ok(report) if !report.is_clean() => {
                    problems.push(format!("could not delete {}", report.failed.join(", ")));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Reset aborted, installed models could not be listed: {}", e);
                    let message = format!(
                        "Could not list installed models ({}). Nothing was uninstalled.",
                        e
                    );
                    on_status(&message);
                    return ResetOutcome {
                        success: false,
                        message,
                    };
                }
            }
        } else {
            on_status("Runtime not installed, no models to remove");
        }

        on_status("Uninstalling the runtime...");
        self.supervisor.stop(on_status).await;
        if !self.uninstaller.uninstall(on_status).await {
            problems.push("runtime could not be fully removed".to_string());
        }
        self.supervisor.detect_status().await;

        on_status("Clearing local data...");
        if let Err(e) = self.state.clear_local_state().await {
            warn!("Failed to clear local state: {}", e);
            problems.push(format!("local data not cleared ({})", e));
        }

        if let Err(e) = self.state.request_onboarding().await {
            warn!("Failed to flag onboarding: {}", e);
            problems.push(format!("onboarding not scheduled ({})", e));
        }

        let outcome = if problems.is_empty() {
            ResetOutcome {
                success: true,
                message: "Reset complete".to_string(),
            }
        } else {
            ResetOutcome {
                success: false,
                message: format!("Reset finished with problems: {}", problems.join("; ")),
            }
        };
        info!("{}", outcome.message);
        on_status(&outcome.message);
        outcome
    }
}
