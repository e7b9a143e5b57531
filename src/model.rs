use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the relocation record kept inside the holding directory.
pub const STATE_FILE_NAME: &str = "original_path.json";

/// Prefix used when a fault escapes an operation instead of being reported by it.
pub const FAULT_PREFIX: &str = "Error: ";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub target_name: String,
    pub holding_dir: PathBuf,
    /// How long to wait for terminated processes to leave the process table.
    pub kill_wait: Duration,
}

impl ManagerConfig {
    pub fn state_file(&self) -> PathBuf {
        self.holding_dir.join(STATE_FILE_NAME)
    }

    /// Where the executable is expected to sit while a relocation is active.
    pub fn holding_target(&self) -> PathBuf {
        self.holding_dir.join(&self.target_name)
    }
}

/// One row of the OS process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
}

impl ProcessRecord {
    pub fn matches(&self, target_name: &str) -> bool {
        self.name.to_lowercase() == target_name.to_lowercase()
    }
}

/// The only durable state: where the executable lived before it was parked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRecord {
    #[serde(default)]
    pub original_path: Option<PathBuf>,
    #[serde(default)]
    pub moved_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerState {
    pub detected_process_path: Option<PathBuf>,
    pub last_known_path: Option<PathBuf>,
    pub original_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Refresh,
    KillAndMove,
    Restore,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::Refresh => "Refresh status",
            Operation::KillAndMove => "Kill and move",
            Operation::Restore => "Restore",
        }
    }

    /// Question shown before a destructive operation runs.
    pub fn confirm_prompt(self, target_name: &str) -> Option<String> {
        match self {
            Operation::Refresh => None,
            Operation::KillAndMove => Some(format!(
                "Terminate every {target_name} process and move the file to the holding directory?"
            )),
            Operation::Restore => Some(format!(
                "Restore {target_name} to its original location?"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusReport {
    Running {
        target: String,
        processes: Vec<ProcessRecord>,
    },
    Relocated {
        target: String,
        original_path: PathBuf,
        holding_path: PathBuf,
    },
    LastKnown {
        target: String,
        path: PathBuf,
    },
    NotFound {
        target: String,
    },
}

impl StatusReport {
    pub fn to_message(&self) -> String {
        match self {
            StatusReport::Running { target, processes } => {
                let mut out = format!("Found {} {} process(es) running\n\n", processes.len(), target);
                for (i, p) in processes.iter().enumerate() {
                    out.push_str(&format!("Process {}:\n", i + 1));
                    out.push_str(&format!("  PID: {}\n", p.pid));
                    out.push_str(&format!("  Path: {}\n\n", display_opt(p.exe.as_deref())));
                }
                out
            }
            StatusReport::Relocated {
                target,
                original_path,
                holding_path,
            } => format!(
                "No {target} process is running\n\n\
                 A previous relocation of {target} is on record:\n\
                 Original path: {}\n\
                 File currently at: {}\n\
                 You can restore the file to its original location",
                original_path.display(),
                holding_path.display()
            ),
            StatusReport::LastKnown { target, path } => format!(
                "No {target} process is running\n\nLast known path: {}",
                path.display()
            ),
            StatusReport::NotFound { target } => format!("No {target} process is running\n\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveReport {
    pub target: String,
    pub killed: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub holding_dir: PathBuf,
    /// Set when the relocation record could not be written; the move still went ahead.
    pub record_error: Option<String>,
}

impl MoveReport {
    pub fn to_message(&self) -> String {
        let mut out = String::from("Operation completed successfully!\n\n");
        out.push_str(&format!("Terminated {} {} process(es)\n", self.killed, self.target));
        out.push_str(&format!("Original file: {}\n", self.source.display()));
        out.push_str(&format!("New location: {}\n", self.destination.display()));
        out.push_str(&format!("Holding directory: {}\n\n", self.holding_dir.display()));
        match &self.record_error {
            None => out.push_str(&format!(
                "Original path saved to state file: {}",
                self.source.display()
            )),
            Some(e) => out.push_str(&format!("Failed to save state file: {e}")),
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingCleanup {
    Removed,
    KeptNonEmpty,
    /// Cleanup stopped before the directory was looked at.
    Untouched,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub record_deleted: bool,
    pub holding_dir: HoldingCleanup,
    pub cleanup_error: Option<String>,
}

impl RestoreReport {
    pub fn to_message(&self) -> String {
        let mut out = String::from("Restore completed successfully!\n\n");
        out.push_str(&format!("File moved from: {}\n", self.source.display()));
        out.push_str(&format!("Restored to: {}\n", self.destination.display()));
        if self.record_deleted {
            out.push_str("State file deleted\n");
        }
        match self.holding_dir {
            HoldingCleanup::Removed => out.push_str("Holding directory deleted\n"),
            HoldingCleanup::KeptNonEmpty => {
                out.push_str("Holding directory is not empty, kept in place\n")
            }
            HoldingCleanup::Untouched => {}
        }
        if let Some(e) = &self.cleanup_error {
            out.push_str(&format!("Error while cleaning up: {e}\n"));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Status(StatusReport),
    Moved(MoveReport),
    Restored(RestoreReport),
}

impl Report {
    pub fn to_message(&self) -> String {
        match self {
            Report::Status(r) => r.to_message(),
            Report::Moved(r) => r.to_message(),
            Report::Restored(r) => r.to_message(),
        }
    }
}

/// Exactly one of these is delivered per operation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub ok: bool,
    pub message: String,
    pub report: Option<Report>,
    /// Manager state as it stood once the operation returned.
    pub state: ManagerState,
}

/// Events sent from the controller to presentation layers.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Started { operation: Operation },
    Finished { outcome: Box<OperationOutcome> },
    Info(String),
}

pub(crate) fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_name_matching_ignores_case() {
        let rec = ProcessRecord {
            pid: 7,
            name: "8021X.EXE".into(),
            exe: None,
        };
        assert!(rec.matches("8021x.exe"));
        assert!(!rec.matches("8021x"));
    }

    #[test]
    fn running_status_lists_every_process() {
        let report = StatusReport::Running {
            target: "8021x.exe".into(),
            processes: vec![
                ProcessRecord {
                    pid: 10,
                    name: "8021x.exe".into(),
                    exe: Some(PathBuf::from("/opt/a/8021x.exe")),
                },
                ProcessRecord {
                    pid: 11,
                    name: "8021x.exe".into(),
                    exe: None,
                },
            ],
        };
        let msg = report.to_message();
        assert!(msg.starts_with("Found 2 8021x.exe process(es) running"));
        assert!(msg.contains("PID: 10"));
        assert!(msg.contains("Path: /opt/a/8021x.exe"));
        assert!(msg.contains("Path: <unknown>"));
    }

    #[test]
    fn restore_message_notes_kept_directory() {
        let report = RestoreReport {
            source: PathBuf::from("/hold/8021x.exe"),
            destination: PathBuf::from("/opt/8021x.exe"),
            record_deleted: true,
            holding_dir: HoldingCleanup::KeptNonEmpty,
            cleanup_error: None,
        };
        let msg = report.to_message();
        assert!(msg.contains("State file deleted"));
        assert!(msg.contains("not empty, kept in place"));
    }

    #[test]
    fn only_destructive_operations_ask_for_confirmation() {
        assert!(Operation::Refresh.confirm_prompt("x.exe").is_none());
        assert!(Operation::KillAndMove.confirm_prompt("x.exe").is_some());
        assert!(Operation::Restore.confirm_prompt("x.exe").is_some());
    }
}
