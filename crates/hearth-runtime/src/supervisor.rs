//! Keeping the runtime process started and reachable.
//!
//! There is no background watcher. Liveness is re-evaluated lazily whenever
//! [`ServerSupervisor::ensure_running`] or [`ServerSupervisor::detect_status`]
//! is called, and a runtime that exited since the last call is observed then.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::RuntimeConfig;
use crate::health::HealthProbe;
use crate::models::{OnStatus, RuntimeStatus};
use crate::platform::{OsFamily, PlatformLocator};

/// Upper bound for one service-manager or stop command.
const SERVICE_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Owns the runtime's [`RuntimeStatus`] and drives its start/stop transitions.
pub struct ServerSupervisor {
    probe: Arc<dyn HealthProbe>,
    locator: PlatformLocator,
    runner: Arc<dyn CommandRunner>,
    config: RuntimeConfig,
    status: Mutex<RuntimeStatus>,
}

impl ServerSupervisor {
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        locator: PlatformLocator,
        runner: Arc<dyn CommandRunner>,
        config: RuntimeConfig,
    ) -> Self {
        let initial = if locator.find_runtime_executable().is_some() {
            RuntimeStatus::Stopped
        } else {
            RuntimeStatus::NotInstalled
        };

        Self {
            probe,
            locator,
            runner,
            config,
            status: Mutex::new(initial),
        }
    }

    /// Last observed status. Not re-probed.
    pub fn status(&self) -> RuntimeStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, next: RuntimeStatus) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *status != next {
            info!("Runtime status: {} -> {}", *status, next);
            *status = next;
        }
    }

    pub fn locator(&self) -> &PlatformLocator {
        &self.locator
    }

    /// Probe the runtime and the filesystem and record what was found.
    pub async fn detect_status(&self) -> RuntimeStatus {
        let next = if self.probe.ping().await {
            RuntimeStatus::Running
        } else if self.locator.find_runtime_executable().is_some() {
            RuntimeStatus::Stopped
        } else {
            RuntimeStatus::NotInstalled
        };
        self.set_status(next);
        next
    }

    /// Make sure the runtime answers, starting it if needed.
    ///
    /// Returns `true` as soon as the health probe succeeds. When the deadline
    /// passes the status becomes [`RuntimeStatus::Unreachable`] and `false` is
    /// returned; the started process is left alone and a later call may find it
    /// running. Not cancellable: a caller that stops caring ignores the result.
    pub async fn ensure_running(&self, on_status: OnStatus<'_>) -> bool {
        if self.probe.ping().await {
            self.set_status(RuntimeStatus::Running);
            return true;
        }

        let Some(executable) = self.locator.find_runtime_executable() else {
            self.set_status(RuntimeStatus::NotInstalled);
            on_status("Runtime is not installed");
            return false;
        };

        self.set_status(RuntimeStatus::Starting);
        on_status("Starting the runtime...");

        for spec in service_start_commands(self.locator.os()) {
            if self.run_quietly(&spec).await {
                on_status("Start requested from the service manager");
                if self.wait_healthy(self.config.service_grace, on_status).await {
                    return self.running(on_status);
                }
                // The service owns the port now; a second `serve` would fight it.
                debug!("Service start of `{}` is slow, waiting for it", spec);
                return self.await_started(on_status).await;
            }
        }

        let launch = CommandSpec::new(executable.display().to_string(), ["serve"]);
        on_status("Launching the runtime in the background");
        match self.runner.spawn_detached(&launch) {
            Ok(pid) => {
                debug!("Runtime launched with PID {}", pid);
                self.await_started(on_status).await
            }
            Err(e) => {
                warn!("Direct launch failed: {}", e);
                self.set_status(RuntimeStatus::Stopped);
                on_status("Could not start the runtime");
                false
            }
        }
    }

    /// Wait up to the start deadline for a runtime that was asked to start.
    async fn await_started(&self, on_status: OnStatus<'_>) -> bool {
        if self.wait_healthy(self.config.start_timeout, on_status).await {
            return self.running(on_status);
        }

        self.set_status(RuntimeStatus::Unreachable);
        on_status(&format!(
            "The runtime did not answer within {}s; it may still be starting",
            self.config.start_timeout.as_secs()
        ));
        false
    }

    /// Ask the OS to stop the runtime. Returns `true` if it no longer answers.
    pub async fn stop(&self, on_status: OnStatus<'_>) -> bool {
        on_status("Stopping the runtime...");
        for spec in stop_commands(self.locator.os()) {
            self.run_quietly(&spec).await;
        }

        let stopped = !self.probe.ping().await;
        if stopped {
            let next = if self.locator.find_runtime_executable().is_some() {
                RuntimeStatus::Stopped
            } else {
                RuntimeStatus::NotInstalled
            };
            self.set_status(next);
        } else {
            warn!("Runtime still answering after stop commands");
        }
        stopped
    }

    fn running(&self, on_status: OnStatus<'_>) -> bool {
        self.set_status(RuntimeStatus::Running);
        on_status("Runtime is running");
        true
    }

    async fn run_quietly(&self, spec: &CommandSpec) -> bool {
        match self.runner.run(spec, SERVICE_COMMAND_TIMEOUT).await {
            Ok(output) if output.success => true,
            Ok(output) => {
                debug!("`{}` exited with {:?}", spec, output.code);
                false
            }
            Err(e) => {
                debug!("`{}` could not run: {}", spec, e);
                false
            }
        }
    }

    /// Poll the probe until it answers or `deadline` passes.
    async fn wait_healthy(&self, deadline: Duration, on_status: OnStatus<'_>) -> bool {
        let start = Instant::now();
        let mut last_notice = start;

        loop {
            if self.probe.ping().await {
                return true;
            }
            if start.elapsed() >= deadline {
                return false;
            }
            if last_notice.elapsed() >= self.config.status_interval {
                last_notice = Instant::now();
                on_status(&format!(
                    "Still waiting for the runtime to start ({}s)...",
                    start.elapsed().as_secs()
                ));
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

/// Service-manager commands that start the runtime.
fn service_start_commands(os: OsFamily) -> Vec<CommandSpec> {
    match os {
        OsFamily::Linux => vec![CommandSpec::new(
            "systemctl",
            ["--no-ask-password", "start", "ollama"],
        )],
        OsFamily::MacOs => vec![CommandSpec::new("open", ["-g", "-a", "Ollama"])],
        OsFamily::Windows => Vec::new(),
    }
}

/// Commands that stop the runtime: service first, then the processes.
fn stop_commands(os: OsFamily) -> Vec<CommandSpec> {
    match os {
        OsFamily::Linux => vec![
            CommandSpec::new("systemctl", ["--no-ask-password", "stop", "ollama"]),
            CommandSpec::new("pkill", ["-x", "ollama"]),
        ],
        OsFamily::MacOs => vec![
            CommandSpec::new("osascript", ["-e", "quit app \"Ollama\""]),
            CommandSpec::new("pkill", ["-x", "ollama"]),
        ],
        OsFamily::Windows => vec![
            CommandSpec::new("taskkill", ["/F", "/IM", "ollama app.exe"]),
            CommandSpec::new("taskkill", ["/F", "/IM", "ollama.exe"]),
        ],
    }
}
