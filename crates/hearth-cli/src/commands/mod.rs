//! CLI commands.

pub mod catalog;
pub mod info;
pub mod model;
pub mod runtime;

use std::sync::Arc;

use hearth_runtime::{RuntimeConfig, RuntimeManager};

use crate::state::FileStateStore;

/// Runtime manager for this machine, configured from the environment.
pub(crate) fn manager() -> RuntimeManager {
    RuntimeManager::new(RuntimeConfig::from_env(), Arc::new(FileStateStore::default_location()))
}

/// Status callback printing each line indented.
pub(crate) fn print_status(line: &str) {
    println!("  {}", line);
}
