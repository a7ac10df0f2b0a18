//! Removing the runtime from the machine.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::models::OnStatus;
use crate::platform::{OsFamily, PlatformLocator};

const REMOVAL_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Uninstalls the runtime: OS removal first, then deleting known install roots.
pub struct Uninstaller {
    locator: PlatformLocator,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl Uninstaller {
    pub fn new(locator: PlatformLocator, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            locator,
            runner,
            timeout,
            attempts: REMOVAL_ATTEMPTS,
            backoff: INITIAL_BACKOFF,
        }
    }

    /// Override the retry policy for direct removal.
    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// OS uninstall commands worth trying on this machine, in order.
    pub fn commands(&self) -> Vec<CommandSpec> {
        let mut commands: Vec<CommandSpec> = self
            .locator
            .available_package_managers()
            .into_iter()
            .filter(|pm| pm.invocable)
            .filter_map(|pm| {
                let args: &[&str] = match pm.name.as_str() {
                    "winget" => &["uninstall", "--id", "Ollama.Ollama", "--exact", "--silent"],
                    "choco" => &["uninstall", "ollama", "-y"],
                    "brew" => &["uninstall", "ollama"],
                    "snap" => &["remove", "ollama"],
                    _ => return None,
                };
                Some(CommandSpec::new(pm.program(), args.iter().copied()))
            })
            .collect();

        if self.locator.os() == OsFamily::Windows {
            let vendor = self
                .locator
                .install_roots()
                .iter()
                .map(|root| root.join("unins000.exe"))
                .find(|p| p.is_file());
            if let Some(uninstaller) = vendor {
                commands.push(CommandSpec::new(
                    uninstaller.display().to_string(),
                    ["/VERYSILENT", "/SUPPRESSMSGBOXES", "/NORESTART"],
                ));
            }
        }

        commands
    }

    /// Remove the runtime. Returns `true` once no executable can be found.
    ///
    /// The runtime should already be stopped; files of a process that just
    /// exited may stay locked briefly, which the removal retries absorb.
    pub async fn uninstall(&self, on_status: OnStatus<'_>) -> bool {
        if self.locator.find_runtime_executable().is_none() && !self.any_root_exists() {
            on_status("Runtime is not installed");
            return true;
        }

        for spec in self.commands() {
            on_status(&format!("Running {}", spec));
            match self.runner.run(&spec, self.timeout).await {
                Ok(output) if output.success => {
                    if self.locator.find_runtime_executable().is_none() {
                        info!("Runtime removed by `{}`", spec);
                        on_status("Runtime uninstalled");
                        return true;
                    }
                    debug!("`{}` succeeded but the runtime is still present", spec);
                }
                Ok(output) => warn!("`{}` exited with {:?}", spec, output.code),
                Err(e) => warn!("`{}` failed: {}", spec, e),
            }
        }

        on_status("Removing runtime files...");
        let mut failures = Vec::new();
        for root in self.locator.install_roots() {
            if let Err(e) = self.remove_with_retry(root).await {
                warn!("Could not remove {}: {}", root.display(), e);
                failures.push(root.clone());
            }
        }

        let removed = self.locator.find_runtime_executable().is_none();
        if removed {
            on_status("Runtime uninstalled");
        } else {
            let listed: Vec<String> = failures.iter().map(|p| p.display().to_string()).collect();
            on_status(&format!(
                "Runtime could not be fully removed: {}",
                listed.join(", ")
            ));
        }
        removed
    }

    fn any_root_exists(&self) -> bool {
        self.locator.install_roots().iter().any(|p| p.exists())
    }

    async fn remove_with_retry(&self, path: &Path) -> io::Result<()> {
        let mut backoff = self.backoff;
        let mut attempt = 1;
        loop {
            match remove_path(path).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    debug!(
                        "Removing {} failed (attempt {}/{}): {}",
                        path.display(),
                        attempt,
                        self.attempts,
                        e
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

/// Delete a file or directory tree. Missing paths are fine.
async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collect_status, make_executable, FakeRunner};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_direct_removal_without_tools() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Ollama");
        let exe = root.join("ollama");
        make_executable(&exe);
        std::fs::write(root.join("lib.so"), b"x").unwrap();

        let locator = PlatformLocator::with_layout(OsFamily::Linux, vec![exe.clone()], vec![root.clone()]);
        let runner = Arc::new(FakeRunner::default());
        let uninstaller = Uninstaller::new(locator, runner.clone(), Duration::from_secs(5))
            .with_retry(2, Duration::from_millis(1));

        let (_, sink) = collect_status();
        assert!(uninstaller.uninstall(&sink).await);
        assert!(!root.exists());
        assert!(runner.runs().is_empty());
    }

    #[tokio::test]
    async fn test_package_manager_removal_first() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Cellar/ollama");
        let exe = root.join("bin/ollama");
        make_executable(&exe);

        let locator =
            PlatformLocator::with_layout(OsFamily::MacOs, vec![exe.clone()], vec![root.clone()])
                .with_tools(["brew"]);
        let removed = exe.clone();
        let runner = Arc::new(
            FakeRunner::default().on_run(move |_| {
                let _ = std::fs::remove_file(&removed);
            }),
        );
        let uninstaller = Uninstaller::new(locator, runner.clone(), Duration::from_secs(5));

        let (_, sink) = collect_status();
        assert!(uninstaller.uninstall(&sink).await);

        let runs = runner.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].to_string(), "brew uninstall ollama");
        // Nothing else needed deleting by hand.
        assert!(root.exists());
    }

    #[tokio::test]
    async fn test_failed_package_manager_falls_back_to_removal() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("snap/bin/ollama");
        make_executable(&exe);

        let locator = PlatformLocator::with_layout(
            OsFamily::Linux,
            vec![exe.clone()],
            vec![dir.path().join("snap")],
        )
        .with_tools(["snap"]);
        let runner = Arc::new(FakeRunner::default().failing("snap"));
        let uninstaller = Uninstaller::new(locator, runner.clone(), Duration::from_secs(5));

        let (_, sink) = collect_status();
        assert!(uninstaller.uninstall(&sink).await);
        assert_eq!(runner.runs()[0].program, "snap");
        assert!(!exe.exists());
    }

    #[tokio::test]
    async fn test_nothing_installed_is_success() {
        let dir = tempdir().unwrap();
        let locator = PlatformLocator::with_layout(
            OsFamily::Linux,
            vec![dir.path().join("ollama")],
            vec![dir.path().join("missing")],
        );
        let uninstaller =
            Uninstaller::new(locator, Arc::new(FakeRunner::default()), Duration::from_secs(5));

        let (statuses, sink) = collect_status();
        assert!(uninstaller.uninstall(&sink).await);
        assert_eq!(statuses.lock().unwrap()[0], "Runtime is not installed");
    }

    #[tokio::test]
    async fn test_windows_vendor_uninstaller_listed() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Programs/Ollama");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("unins000.exe"), b"MZ").unwrap();

        let locator = PlatformLocator::with_layout(OsFamily::Windows, vec![], vec![root])
            .with_tools(["winget"]);
        let uninstaller =
            Uninstaller::new(locator, Arc::new(FakeRunner::default()), Duration::from_secs(5));

        let commands = uninstaller.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].program, "winget");
        assert!(commands[1].program.ends_with("unins000.exe"));
    }

    #[tokio::test]
    async fn test_remove_path_handles_files_dirs_and_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let tree = dir.path().join("tree/nested");
        std::fs::create_dir_all(&tree).unwrap();

        remove_path(&file).await.unwrap();
        remove_path(&dir.path().join("tree")).await.unwrap();
        remove_path(&dir.path().join("missing")).await.unwrap();
        assert!(!file.exists());
        assert!(!tree.exists());
    }
}
