//! Getting the runtime binary onto the machine.
//!
//! Installation walks an ordered list of [`InstallStrategy`] providers. Each
//! one is tried only if the previous did not produce a verified install; a
//! failing strategy is logged and skipped. Only exhaustion of the list is
//! reported as a failure, pointing the user at the manual download page.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::models::{InstallationOutcome, OnStatus};
use crate::platform::{OsFamily, PackageManager, PlatformLocator};

/// Where users are sent when every automated strategy fails.
pub const MANUAL_DOWNLOAD_URL: &str = "https://ollama.com/download";

/// One way of installing the runtime.
#[async_trait]
pub trait InstallStrategy: Send + Sync {
    /// Short label used in status lines.
    fn name(&self) -> String;

    /// Whether this strategy can be attempted on this machine at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Perform the install. Success here is only a claim; the manager verifies it.
    async fn attempt(&self, on_status: OnStatus<'_>) -> Result<(), RuntimeError>;
}

/// Installs the runtime through an ordered list of strategies.
pub struct InstallationManager {
    locator: PlatformLocator,
    strategies: Vec<Box<dyn InstallStrategy>>,
    settle_delay: Duration,
}

impl InstallationManager {
    /// Create a manager with an explicit strategy list.
    pub fn new(
        locator: PlatformLocator,
        strategies: Vec<Box<dyn InstallStrategy>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            locator,
            strategies,
            settle_delay,
        }
    }

    /// Standard strategies for the locator's OS: package manager, then direct download.
    pub fn for_platform(
        locator: PlatformLocator,
        runner: Arc<dyn CommandRunner>,
        config: &RuntimeConfig,
    ) -> Self {
        let mut strategies: Vec<Box<dyn InstallStrategy>> = Vec::new();

        if let Some(manager) = locator.preferred_package_manager() {
            strategies.push(Box::new(PackageManagerInstall::new(
                manager,
                runner.clone(),
                config.install_timeout,
            )));
        }

        strategies.push(Box::new(DirectDownloadInstall::new(
            locator.os(),
            runner,
            config.install_timeout,
        )));

        Self::new(locator, strategies, config.settle_delay)
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Ensure the runtime binary is present.
    pub async fn install(&self, on_status: OnStatus<'_>) -> InstallationOutcome {
        if let Some(path) = self.locator.find_runtime_executable() {
            let message = format!("Runtime already installed at {}", path.display());
            on_status(&message);
            return InstallationOutcome::installed(message);
        }

        for strategy in &self.strategies {
            let name = strategy.name();
            if !strategy.is_available() {
                debug!("Install strategy '{}' not available, skipping", name);
                continue;
            }

            info!("Trying install strategy '{}'", name);
            on_status(&format!("Installing with {}...", name));

            match strategy.attempt(on_status).await {
                Ok(()) => {
                    on_status("Verifying installation...");
                    tokio::time::sleep(self.settle_delay).await;

                    if let Some(path) = self.locator.find_runtime_executable() {
                        let message = format!("Runtime installed at {}", path.display());
                        info!("{}", message);
                        on_status(&message);
                        return InstallationOutcome::installed(message);
                    }

                    warn!("Strategy '{}' finished but runtime was not found", name);
                    on_status(&format!(
                        "{} finished but the runtime was not found, trying next option",
                        name
                    ));
                }
                Err(e) => {
                    warn!("Install strategy '{}' failed: {}", name, e);
                    on_status(&format!("{} failed: {}", name, e));
                }
            }
        }

        let message = format!(
            "Automatic installation failed. Install manually from {}",
            MANUAL_DOWNLOAD_URL
        );
        on_status(&message);
        InstallationOutcome::failed(message)
    }
}

/// Install via the OS's preferred package manager, non-interactively.
pub struct PackageManagerInstall {
    manager: PackageManager,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl PackageManagerInstall {
    pub fn new(manager: PackageManager, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            manager,
            runner,
            timeout,
        }
    }

    /// The command line for this manager.
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(self.manager.program(), install_args(&self.manager.name))
    }
}

fn install_args(manager: &str) -> Vec<&'static str> {
    match manager {
        "winget" => vec![
            "install",
            "--id",
            "Ollama.Ollama",
            "--exact",
            "--silent",
            "--accept-package-agreements",
            "--accept-source-agreements",
            "--disable-interactivity",
        ],
        "choco" => vec!["install", "ollama", "-y", "--no-progress"],
        "brew" => vec!["install", "--quiet", "ollama"],
        _ => vec!["install", "ollama"],
    }
}

#[async_trait]
impl InstallStrategy for PackageManagerInstall {
    fn name(&self) -> String {
        self.manager.name.clone()
    }

    fn is_available(&self) -> bool {
        self.manager.invocable
    }

    async fn attempt(&self, on_status: OnStatus<'_>) -> Result<(), RuntimeError> {
        let spec = self.command();
        on_status(&format!("Running {}", spec));
        self.runner.run(&spec, self.timeout).await?.into_result(&spec)?;
        Ok(())
    }
}

/// Download the vendor installer for the OS and run it without prompts.
pub struct DirectDownloadInstall {
    os: OsFamily,
    url: String,
    client: reqwest::Client,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    work_dir: PathBuf,
}

impl DirectDownloadInstall {
    pub fn new(os: OsFamily, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            os,
            url: installer_url(os).to_string(),
            client: reqwest::Client::new(),
            runner,
            timeout,
            work_dir: std::env::temp_dir().join("hearth-installer"),
        }
    }

    /// Fetch the artifact from `url` instead of the vendor default.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Directory the artifact is downloaded into.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    fn artifact_name(&self) -> &'static str {
        match self.os {
            OsFamily::Windows => "OllamaSetup.exe",
            OsFamily::MacOs => "Ollama-darwin.zip",
            OsFamily::Linux => "install.sh",
        }
    }

    /// Commands that install from the downloaded artifact, tried in order.
    fn install_commands(&self, artifact: &Path) -> Vec<CommandSpec> {
        let artifact = artifact.display().to_string();
        match self.os {
            OsFamily::Windows => vec![CommandSpec::new(
                artifact,
                ["/VERYSILENT", "/NORESTART", "/SUPPRESSMSGBOXES"],
            )],
            OsFamily::MacOs => {
                let mut commands = vec![CommandSpec::new(
                    "ditto",
                    ["-x", "-k", artifact.as_str(), "/Applications"],
                )];
                if let Some(home) = dirs::home_dir() {
                    let user_apps = home.join("Applications").display().to_string();
                    commands.push(CommandSpec::new(
                        "ditto",
                        ["-x", "-k", artifact.as_str(), user_apps.as_str()],
                    ));
                }
                commands
            }
            OsFamily::Linux => vec![CommandSpec::new("sh", [artifact])],
        }
    }
}

fn installer_url(os: OsFamily) -> &'static str {
    match os {
        OsFamily::Windows => "https://ollama.com/download/OllamaSetup.exe",
        OsFamily::MacOs => "https://ollama.com/download/Ollama-darwin.zip",
        OsFamily::Linux => "https://ollama.com/install.sh",
    }
}

#[async_trait]
impl InstallStrategy for DirectDownloadInstall {
    fn name(&self) -> String {
        "direct download".to_string()
    }

    async fn attempt(&self, on_status: OnStatus<'_>) -> Result<(), RuntimeError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let artifact = self.work_dir.join(self.artifact_name());

        on_status(&format!("Downloading installer from {}", self.url));
        download_artifact(&self.client, &self.url, &artifact, on_status).await?;

        #[cfg(unix)]
        if self.os != OsFamily::Windows {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            tokio::fs::set_permissions(&artifact, perms).await?;
        }

        let mut last_error = None;
        for spec in self.install_commands(&artifact) {
            on_status(&format!("Running installer: {}", spec));
            match self
                .runner
                .run(&spec, self.timeout)
                .await
                .and_then(|out| out.into_result(&spec))
            {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!("Installer command `{}` failed: {}", spec, e);
                    last_error = Some(e);
                }
            }
        }

        let _ = tokio::fs::remove_file(&artifact).await;

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Stream `url` into `dest`, reporting progress in 10% steps when the size is known.
pub async fn download_artifact(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_status: OnStatus<'_>,
) -> Result<(), RuntimeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RuntimeError::DownloadFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RuntimeError::DownloadFailed(format!(
            "HTTP {}: {}",
            response.status(),
            url
        )));
    }

    let total = response.content_length();
    let mut file = tokio::io::BufWriter::new(tokio::fs::File::create(dest).await?);
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_step = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RuntimeError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let step = downloaded * 10 / total;
            if step > last_step {
                last_step = step;
                on_status(&format!("Downloading installer: {}%", (step * 10).min(100)));
            }
        }
    }

    file.flush().await?;
    debug!("Downloaded {} bytes to {}", downloaded, dest.display());
    Ok(())
}
