//! Platform inspection: where the runtime lives and which tools can install it.
//!
//! Everything here is read-only. Absence of a binary or tool is an ordinary
//! answer (`None` / `invocable: false`), never an error.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Operating-system family the runtime is managed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
}

impl OsFamily {
    /// The family of the host we are running on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else {
            OsFamily::Linux
        }
    }

    /// Name of the runtime executable on this family.
    pub fn executable_name(self) -> &'static str {
        match self {
            OsFamily::Windows => "ollama.exe",
            OsFamily::MacOs | OsFamily::Linux => "ollama",
        }
    }

    /// The single package manager preferred for installing the runtime.
    pub fn preferred_package_manager(self) -> &'static str {
        match self {
            OsFamily::Windows => "winget",
            OsFamily::MacOs => "brew",
            OsFamily::Linux => "snap",
        }
    }

    pub fn all() -> [OsFamily; 3] {
        [OsFamily::Windows, OsFamily::MacOs, OsFamily::Linux]
    }
}

/// A package-manager tool and whether it can be invoked on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    pub name: String,
    /// Resolved location of the tool, when found
    pub path: Option<PathBuf>,
    pub invocable: bool,
}

impl PackageManager {
    /// Program to execute: the resolved path if known, otherwise the bare name.
    pub fn program(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// How tools such as package managers are discovered.
#[derive(Debug, Clone)]
enum ToolLookup {
    /// Search `PATH`, then well-known tool directories.
    System,
    /// A fixed set of tool names treated as invocable.
    Fixed(Vec<String>),
}

/// Locates the runtime executable, its install roots and installer tooling.
#[derive(Debug, Clone)]
pub struct PlatformLocator {
    os: OsFamily,
    executables: Vec<PathBuf>,
    install_roots: Vec<PathBuf>,
    search_path: bool,
    tools: ToolLookup,
}

impl PlatformLocator {
    /// Locator for the host OS with the standard search layout.
    pub fn detect() -> Self {
        Self::for_os(OsFamily::current())
    }

    /// Locator using the standard layout for `os`.
    pub fn for_os(os: OsFamily) -> Self {
        Self {
            os,
            executables: default_executables(os),
            install_roots: default_install_roots(os),
            search_path: true,
            tools: ToolLookup::System,
        }
    }

    /// Locator with an explicit layout. `PATH` is not consulted and no tools are available.
    pub fn with_layout(os: OsFamily, executables: Vec<PathBuf>, install_roots: Vec<PathBuf>) -> Self {
        Self {
            os,
            executables,
            install_roots,
            search_path: false,
            tools: ToolLookup::Fixed(Vec::new()),
        }
    }

    /// Treat exactly these tools as invocable.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = ToolLookup::Fixed(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    /// Candidate executable locations, in search order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.executables
    }

    /// Directories and files removed when uninstalling by hand.
    pub fn install_roots(&self) -> &[PathBuf] {
        &self.install_roots
    }

    /// First candidate that exists and is executable, then `PATH`.
    pub fn find_runtime_executable(&self) -> Option<PathBuf> {
        if let Some(found) = self.executables.iter().find(|p| is_executable(p)) {
            debug!("Runtime executable found at {}", found.display());
            return Some(found.clone());
        }

        if self.search_path {
            if let Ok(found) = which::which(self.os.executable_name()) {
                if is_executable(&found) {
                    debug!("Runtime executable found on PATH at {}", found.display());
                    return Some(found);
                }
            }
        }

        debug!("No runtime executable found");
        None
    }

    /// Package managers known for this OS, preferred first.
    pub fn available_package_managers(&self) -> Vec<PackageManager> {
        known_package_managers(self.os)
            .iter()
            .map(|name| {
                let path = self.resolve_tool(name);
                PackageManager {
                    name: name.to_string(),
                    invocable: path.is_some(),
                    path: path.filter(|p| p.is_absolute()),
                }
            })
            .collect()
    }

    /// The preferred package manager, if it can be invoked.
    pub fn preferred_package_manager(&self) -> Option<PackageManager> {
        let preferred = self.os.preferred_package_manager();
        self.available_package_managers()
            .into_iter()
            .find(|pm| pm.name == preferred && pm.invocable)
    }

    fn resolve_tool(&self, name: &str) -> Option<PathBuf> {
        match &self.tools {
            ToolLookup::Fixed(tools) => tools
                .iter()
                .any(|t| t == name)
                .then(|| PathBuf::from(name)),
            ToolLookup::System => which::which(name).ok().or_else(|| {
                tool_fallback_dirs(self.os)
                    .into_iter()
                    .map(|dir| dir.join(tool_file_name(self.os, name)))
                    .find(|p| is_executable(p))
            }),
        }
    }
}

impl Default for PlatformLocator {
    fn default() -> Self {
        Self::detect()
    }
}

fn known_package_managers(os: OsFamily) -> &'static [&'static str] {
    match os {
        OsFamily::Windows => &["winget", "choco"],
        OsFamily::MacOs => &["brew"],
        OsFamily::Linux => &["snap"],
    }
}

fn tool_file_name(os: OsFamily, name: &str) -> String {
    match os {
        OsFamily::Windows => format!("{}.exe", name),
        _ => name.to_string(),
    }
}

/// Directories GUI-launched processes often miss on `PATH`.
fn tool_fallback_dirs(os: OsFamily) -> Vec<PathBuf> {
    match os {
        OsFamily::MacOs => vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
        ],
        OsFamily::Linux => vec![PathBuf::from("/snap/bin"), PathBuf::from("/usr/bin")],
        OsFamily::Windows => env_dir("LOCALAPPDATA")
            .map(|d| vec![d.join("Microsoft").join("WindowsApps")])
            .unwrap_or_default(),
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

/// User-local, then system-wide, then vendor-specific locations.
fn default_executables(os: OsFamily) -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let exe = os.executable_name();
    let mut paths = Vec::new();

    match os {
        OsFamily::Windows => {
            if let Some(local) = env_dir("LOCALAPPDATA").or_else(dirs::data_local_dir) {
                paths.push(local.join("Programs").join("Ollama").join(exe));
            }
            if let Some(program_files) = env_dir("ProgramFiles") {
                paths.push(program_files.join("Ollama").join(exe));
            }
            if let Some(local) = env_dir("LOCALAPPDATA").or_else(dirs::data_local_dir) {
                paths.push(local.join("Ollama").join(exe));
            }
        }
        OsFamily::MacOs => {
            if let Some(home) = &home {
                paths.push(app_bundle_binary(&home.join("Applications")));
            }
            paths.push(PathBuf::from("/usr/local/bin").join(exe));
            paths.push(PathBuf::from("/opt/homebrew/bin").join(exe));
            paths.push(app_bundle_binary(Path::new("/Applications")));
        }
        OsFamily::Linux => {
            if let Some(home) = &home {
                paths.push(home.join(".local").join("bin").join(exe));
            }
            paths.push(PathBuf::from("/usr/local/bin").join(exe));
            paths.push(PathBuf::from("/usr/bin").join(exe));
            paths.push(PathBuf::from("/snap/bin").join(exe));
            paths.push(PathBuf::from("/opt/ollama/bin").join(exe));
        }
    }

    paths
}

fn default_install_roots(os: OsFamily) -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut roots = Vec::new();

    match os {
        OsFamily::Windows => {
            if let Some(local) = env_dir("LOCALAPPDATA").or_else(dirs::data_local_dir) {
                roots.push(local.join("Programs").join("Ollama"));
                roots.push(local.join("Ollama"));
            }
        }
        OsFamily::MacOs => {
            if let Some(home) = &home {
                roots.push(home.join("Applications").join("Ollama.app"));
            }
            roots.push(PathBuf::from("/Applications/Ollama.app"));
            roots.push(PathBuf::from("/usr/local/bin/ollama"));
        }
        OsFamily::Linux => {
            if let Some(home) = &home {
                roots.push(home.join(".local").join("bin").join("ollama"));
            }
            roots.push(PathBuf::from("/usr/local/bin/ollama"));
            roots.push(PathBuf::from("/usr/local/lib/ollama"));
            roots.push(PathBuf::from("/opt/ollama"));
        }
    }

    roots
}

fn app_bundle_binary(applications: &Path) -> PathBuf {
    applications
        .join("Ollama.app")
        .join("Contents")
        .join("Resources")
        .join("ollama")
}

/// True if `path` is a regular file we are allowed to execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
