//! Data model shared by the runtime operations.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Callback receiving human-readable status lines.
pub type OnStatus<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Lifecycle state of the local runtime, owned by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeStatus {
    NotInstalled,
    Installing,
    Stopped,
    Starting,
    Running,
    /// Start was attempted but the runtime did not answer before the deadline.
    Unreachable,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuntimeStatus::NotInstalled => "not installed",
            RuntimeStatus::Installing => "installing",
            RuntimeStatus::Stopped => "stopped",
            RuntimeStatus::Starting => "starting",
            RuntimeStatus::Running => "running",
            RuntimeStatus::Unreachable => "unreachable",
        };
        f.write_str(label)
    }
}

/// A model present in the runtime's local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    /// Model name with tag (e.g., "llama3.2:1b")
    pub name: String,
    /// Size on disk in bytes, when reported
    #[serde(default)]
    pub size: Option<u64>,
    /// Content digest, when reported
    #[serde(default)]
    pub digest: Option<String>,
}

/// Snapshot of the model identifiers the runtime currently holds.
///
/// Always re-queried after a pull or delete; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledModelSet {
    names: BTreeSet<String>,
}

impl InstalledModelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a model is present. `name` and `name:latest` are the same model.
    pub fn contains(&self, id: &str) -> bool {
        let wanted = canonical_name(id);
        self.names.iter().any(|n| canonical_name(n) == wanted)
    }
}

impl FromIterator<InstalledModel> for InstalledModelSet {
    fn from_iter<T: IntoIterator<Item = InstalledModel>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(|m| m.name))
    }
}

/// Normalize a model reference so that an untagged name compares equal to `:latest`.
pub fn canonical_name(id: &str) -> String {
    let id = id.trim().to_lowercase();
    if id.contains(':') {
        id
    } else {
        format!("{}:latest", id)
    }
}

/// Correlation token identifying one pull operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Coarse phase of a pull, derived from the runtime's status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PullPhase {
    Manifest,
    Downloading,
    Verifying,
    Writing,
    Other,
    /// Terminal: the model is present after the pull.
    Success,
    /// Terminal: the model is absent after the pull.
    Failed,
}

impl PullPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PullPhase::Success | PullPhase::Failed)
    }
}

/// One normalized progress event of a pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullProgressEvent {
    pub operation_id: OperationId,
    pub phase: PullPhase,
    /// Human-readable status as reported by the runtime
    pub status: String,
    /// Progress in the range 0-100, when known
    pub percent: Option<f64>,
}

/// Terminal value of an installation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl InstallationOutcome {
    pub fn installed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Result of deleting every installed model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteAllReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

impl DeleteAllReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of the destructive reset flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_set_latest_equivalence() {
        let set = InstalledModelSet::new(["llama3.2:latest", "mistral:7b"]);
        assert!(set.contains("llama3.2"));
        assert!(set.contains("LLAMA3.2:latest"));
        assert!(set.contains("mistral:7b"));
        assert!(!set.contains("mistral"));
        assert!(!set.contains("llama3.2:1b"));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(PullPhase::Success.is_terminal());
        assert!(PullPhase::Failed.is_terminal());
        assert!(!PullPhase::Downloading.is_terminal());
    }

    #[test]
    fn test_operation_ids_are_unique() {
        assert_ne!(OperationId::new(), OperationId::new());
    }

    #[test]
    fn test_progress_event_json_shape() {
        let id = OperationId::new();
        let event = PullProgressEvent {
            operation_id: id,
            phase: PullPhase::Downloading,
            status: "pulling dde5aa3fc5ff".to_string(),
            percent: Some(42.0),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["operationId"], id.to_string());
        assert_eq!(value["phase"], "downloading");
        assert_eq!(value["percent"], 42.0);

        let back: PullProgressEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
