//! The published runtime operations in one place.

use std::sync::Arc;

use tracing::warn;

use crate::client::{RuntimeApi, RuntimeClient};
use crate::command::{CommandRunner, SystemRunner};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::health::{HealthProbe, HttpHealthProbe};
use crate::install::InstallationManager;
use crate::library::ModelLibrary;
use crate::models::{
    DeleteAllReport, InstallationOutcome, InstalledModel, OnStatus, ResetOutcome, RuntimeStatus,
};
use crate::platform::PlatformLocator;
use crate::pull::{PullHandle, PullOrchestrator};
use crate::reset::{AppStateStore, LifecycleResetOrchestrator};
use crate::supervisor::ServerSupervisor;
use crate::uninstall::Uninstaller;

/// Entry point for callers: install, start, pull, list, delete, uninstall, reset.
///
/// Owns the single [`ServerSupervisor`] and therefore the runtime status.
/// Mutating operations are expected to be called one at a time.
pub struct RuntimeManager {
    config: RuntimeConfig,
    supervisor: ServerSupervisor,
    installer: InstallationManager,
    pulls: PullOrchestrator,
    library: ModelLibrary,
    uninstaller: Uninstaller,
    state: Arc<dyn AppStateStore>,
}

impl RuntimeManager {
    /// Manager for this machine, talking to the runtime at `config.base_url`.
    pub fn new(config: RuntimeConfig, state: Arc<dyn AppStateStore>) -> Self {
        let probe = Arc::new(HttpHealthProbe::new(&config.base_url, config.probe_timeout));
        let api = Arc::new(RuntimeClient::with_url(config.base_url.clone()));
        Self::from_parts(
            config,
            probe,
            PlatformLocator::detect(),
            Arc::new(SystemRunner),
            api,
            state,
        )
    }

    /// Manager built from explicit collaborators.
    pub fn from_parts(
        config: RuntimeConfig,
        probe: Arc<dyn HealthProbe>,
        locator: PlatformLocator,
        runner: Arc<dyn CommandRunner>,
        api: Arc<dyn RuntimeApi>,
        state: Arc<dyn AppStateStore>,
    ) -> Self {
        let installer = InstallationManager::for_platform(locator.clone(), runner.clone(), &config);
        let uninstaller = Uninstaller::new(locator.clone(), runner.clone(), config.install_timeout);
        let supervisor = ServerSupervisor::new(probe, locator, runner, config.clone());

        Self {
            config,
            supervisor,
            installer,
            pulls: PullOrchestrator::new(api.clone()),
            library: ModelLibrary::new(api),
            uninstaller,
            state,
        }
    }

    /// Replace the install strategy chain.
    pub fn with_installer(mut self, installer: InstallationManager) -> Self {
        self.installer = installer;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn locator(&self) -> &PlatformLocator {
        self.supervisor.locator()
    }

    /// Last observed runtime status.
    pub fn status(&self) -> RuntimeStatus {
        self.supervisor.status()
    }

    /// Re-probe and return the runtime status.
    pub async fn refresh_status(&self) -> RuntimeStatus {
        self.supervisor.detect_status().await
    }

    /// Make sure the runtime binary is installed.
    pub async fn install(&self, on_status: OnStatus<'_>) -> InstallationOutcome {
        let previous = self.supervisor.status();
        self.supervisor.set_status(RuntimeStatus::Installing);
        let outcome = self.installer.install(on_status).await;
        if outcome.success {
            self.supervisor.detect_status().await;
        } else {
            self.supervisor.set_status(previous);
        }
        outcome
    }

    /// Make sure the runtime answers, starting it if needed.
    pub async fn ensure_running(&self, on_status: OnStatus<'_>) -> bool {
        self.supervisor.ensure_running(on_status).await
    }

    /// Pull a model, installing and starting the runtime first if needed.
    pub async fn pull(&self, model: &str, on_status: OnStatus<'_>) -> bool {
        if let Err(e) = self.prepare(on_status).await {
            on_status(&format!("Cannot pull {}: {}", model, e));
            return false;
        }
        self.pulls.pull(model, on_status).await
    }

    /// Like [`RuntimeManager::pull`], but progress arrives as typed events.
    ///
    /// If the runtime cannot be made ready, no pull is started and the
    /// returned handle reports a single `Failed` event naming the cause.
    pub async fn pull_with_events(&self, model: &str, on_status: OnStatus<'_>) -> PullHandle {
        if let Err(e) = self.prepare(on_status).await {
            warn!("Pull of {} not started: {}", model, e);
            return PullHandle::failed(e.to_string());
        }
        self.pulls.pull_with_events(model)
    }

    /// Models the runtime holds. Empty when it cannot be asked.
    pub async fn list_installed(&self) -> Vec<InstalledModel> {
        match self.library.list_installed().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Could not list installed models: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn delete_model(&self, name: &str) -> bool {
        self.library.delete_model(name).await
    }

    /// Delete every model. `None` when the installed models could not be listed.
    pub async fn delete_all(&self, on_status: OnStatus<'_>) -> Option<DeleteAllReport> {
        match self.library.delete_all(on_status).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Could not list installed models: {}", e);
                on_status(&format!("Could not list installed models: {}", e));
                None
            }
        }
    }

    /// Stop and remove the runtime.
    pub async fn uninstall(&self, on_status: OnStatus<'_>) -> bool {
        self.supervisor.stop(on_status).await;
        let removed = self.uninstaller.uninstall(on_status).await;
        self.supervisor.detect_status().await;
        removed
    }

    /// Delete all models, uninstall the runtime, clear app state and request onboarding.
    pub async fn reset_everything(&self, on_status: OnStatus<'_>) -> ResetOutcome {
        LifecycleResetOrchestrator::new(
            &self.library,
            &self.supervisor,
            &self.uninstaller,
            self.state.as_ref(),
        )
        .reset_everything(on_status)
        .await
    }

    /// Install and start the runtime as needed before talking to its API.
    async fn prepare(&self, on_status: OnStatus<'_>) -> Result<(), RuntimeError> {
        if self.supervisor.ensure_running(on_status).await {
            return Ok(());
        }
        if self.supervisor.status() != RuntimeStatus::NotInstalled {
            return Err(RuntimeError::NotReachable(self.config.base_url.clone()));
        }

        let outcome = self.install(on_status).await;
        if !outcome.success {
            if let Some(message) = &outcome.message {
                warn!("Install before pull failed: {}", message);
            }
            return Err(RuntimeError::NotInstalled);
        }

        if self.supervisor.ensure_running(on_status).await {
            Ok(())
        } else {
            Err(RuntimeError::NotReachable(self.config.base_url.clone()))
        }
    }
}
