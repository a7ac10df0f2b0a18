//! Local inference runtime supervision for Hearth.
//!
//! This crate installs the runtime, keeps its process started and reachable,
//! drives model pulls through the runtime's own API, and tears everything down
//! again on request. [`RuntimeManager`] is the entry point; the pieces it is
//! built from are public so callers can swap collaborators.

pub mod client;
pub mod command;
mod config;
mod error;
pub mod health;
pub mod install;
mod library;
mod manager;
mod models;
pub mod platform;
mod pull;
mod reset;
mod supervisor;
mod uninstall;

#[cfg(test)]
mod testing;

pub use client::{RuntimeApi, RuntimeClient};
pub use command::{CommandRunner, SystemRunner};
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::RuntimeError;
pub use health::{HealthProbe, HttpHealthProbe};
pub use install::{InstallStrategy, InstallationManager, MANUAL_DOWNLOAD_URL};
pub use library::ModelLibrary;
pub use manager::RuntimeManager;
pub use models::{
    canonical_name, DeleteAllReport, InstallationOutcome, InstalledModel, InstalledModelSet,
    OnStatus, OperationId, PullPhase, PullProgressEvent, ResetOutcome, RuntimeStatus,
};
pub use platform::{OsFamily, PackageManager, PlatformLocator};
pub use pull::{PullHandle, PullOrchestrator};
pub use reset::{AppStateStore, LifecycleResetOrchestrator};
pub use supervisor::ServerSupervisor;
pub use uninstall::Uninstaller;

/// Default base URL of the runtime's local API.
pub const DEFAULT_RUNTIME_URL: &str = "http://127.0.0.1:11434";
