//! The three operations: status refresh, kill-and-move, and restore.
//!
//! Every step either succeeds or ends the operation with an [`OperationError`];
//! nothing is retried or rolled back. Steps are ordered so the process is gone
//! before any file is touched.

use crate::error::OperationError;
use crate::model::{
    HoldingCleanup, ManagerConfig, ManagerState, MoveReport, ProcessRecord, RestoreReport,
    StatusReport,
};
use crate::process_table::{self, ProcessTable};
use crate::relocate;
use crate::storage;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct ProcessFileManager<T: ProcessTable> {
    config: ManagerConfig,
    table: T,
    state: ManagerState,
}

impl<T: ProcessTable> ProcessFileManager<T> {
    /// Build a manager, picking up any relocation recorded by a previous session.
    pub fn new(config: ManagerConfig, table: T) -> Self {
        let mut state = ManagerState::default();
        if let Some(record) = storage::load_record(&config.state_file()) {
            if let Some(path) = record.original_path {
                info!("Loaded original path from state file: {}", path.display());
                state.original_path = Some(path);
            }
        }
        Self {
            config,
            table,
            state,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    fn find_targets(&mut self) -> Result<Vec<ProcessRecord>, OperationError> {
        process_table::find_matching(&mut self.table, &self.config.target_name)
    }

    /// Look at the process table and report where the target is.
    pub fn refresh_status(&mut self) -> Result<StatusReport, OperationError> {
        let target = self.config.target_name.clone();
        let processes = self.find_targets()?;

        if let Some(first) = processes.first() {
            self.state.detected_process_path = first.exe.clone();
            if first.exe.is_some() {
                self.state.last_known_path = first.exe.clone();
            }
            return Ok(StatusReport::Running { target, processes });
        }

        self.state.detected_process_path = None;
        if let Some(original_path) = self.state.original_path.clone() {
            Ok(StatusReport::Relocated {
                target,
                original_path,
                holding_path: self.config.holding_target(),
            })
        } else if let Some(path) = self.state.last_known_path.clone() {
            Ok(StatusReport::LastKnown { target, path })
        } else {
            Ok(StatusReport::NotFound { target })
        }
    }

    /// Terminate every target process and park its executable in the holding directory.
    pub fn kill_and_move(&mut self) -> Result<MoveReport, OperationError> {
        let target = self.config.target_name.clone();
        let processes = self.find_targets()?;

        let mut killed = Vec::with_capacity(processes.len());
        for p in &processes {
            self.table.kill(p.pid)?;
            info!("Terminated {} (pid {})", target, p.pid);
            killed.push(p.pid);
        }
        if killed.is_empty() {
            return Err(OperationError::NotRunning { target });
        }

        self.wait_for_exit(&killed);

        let sighted: Vec<PathBuf> = processes.iter().filter_map(|p| p.exe.clone()).collect();
        let source = self
            .file_to_move(&sighted)
            .ok_or_else(|| OperationError::LocationUnknown {
                target: target.clone(),
            })?;
        let holding_dir = self.config.holding_dir.clone();
        if is_directly_in(&holding_dir, &source) {
            return Err(OperationError::AlreadyHeld { path: source });
        }

        self.state.original_path = Some(source.clone());
        let record_error = match storage::save_record(
            &self.config.state_file(),
            &storage::capture_record(&source),
        ) {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to save relocation record: {e:#}");
                Some(format!("{e:#}"))
            }
        };

        relocate::ensure_dir(&holding_dir).map_err(|source| OperationError::CreateDir {
            path: holding_dir.clone(),
            source,
        })?;

        let file_name = source
            .file_name()
            .ok_or_else(|| OperationError::LocationUnknown {
                target: target.clone(),
            })?;
        let destination = holding_dir.join(file_name);

        if relocate::remove_existing(&destination).map_err(|e| OperationError::RemoveFile {
            path: destination.clone(),
            source: e,
        })? {
            debug!("Removed stale copy at {}", destination.display());
        }

        relocate::move_file(&source, &destination).map_err(|e| OperationError::MoveFile {
            from: source.clone(),
            to: destination.clone(),
            source: e,
        })?;
        info!("Moved {} to {}", source.display(), destination.display());

        self.state.detected_process_path = None;
        self.state.last_known_path = Some(destination.clone());

        Ok(MoveReport {
            target,
            killed: killed.len(),
            source,
            destination,
            holding_dir: absolute(&holding_dir),
            record_error,
        })
    }

    /// Move the parked executable back to where it was recorded.
    pub fn restore_file(&mut self) -> Result<RestoreReport, OperationError> {
        let target = self.config.target_name.clone();
        let holding_dir = self.config.holding_dir.clone();

        if !holding_dir.is_dir() {
            return Err(OperationError::HoldingDirMissing { path: holding_dir });
        }

        if self.state.original_path.is_none() {
            self.state.original_path = storage::load_record(&self.config.state_file())
                .and_then(|record| record.original_path);
        }
        let original = self
            .state
            .original_path
            .clone()
            .ok_or_else(|| OperationError::NoRecord {
                target: target.clone(),
            })?;

        let parked = relocate::find_file_named(&holding_dir, &target)
            .map_err(|source| OperationError::ReadDir {
                path: holding_dir.clone(),
                source,
            })?
            .ok_or_else(|| OperationError::FileNotInHolding {
                target: target.clone(),
                dir: holding_dir.clone(),
            })?;

        if let Some(parent) = original.parent().filter(|p| !p.as_os_str().is_empty()) {
            relocate::ensure_dir(parent).map_err(|source| OperationError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        relocate::remove_existing(&original).map_err(|source| OperationError::RemoveFile {
            path: original.clone(),
            source,
        })?;

        relocate::move_file(&parked, &original).map_err(|source| OperationError::MoveFile {
            from: parked.clone(),
            to: original.clone(),
            source,
        })?;
        info!("Restored {} to {}", parked.display(), original.display());

        let mut report = RestoreReport {
            source: parked,
            destination: original.clone(),
            record_deleted: false,
            holding_dir: HoldingCleanup::Untouched,
            cleanup_error: None,
        };
        if let Err(e) = self.clean_up_holding(&mut report) {
            warn!("Cleanup after restore failed: {e:#}");
            report.cleanup_error = Some(format!("{e:#}"));
        }

        self.state.last_known_path = Some(original);
        self.state.detected_process_path = None;
        self.state.original_path = None;

        Ok(report)
    }

    /// Prefer the freshly detected path, then the last known one, then whatever the
    /// kill-time listing reported. The chosen path must still exist.
    fn file_to_move(&self, sighted: &[PathBuf]) -> Option<PathBuf> {
        self.state
            .detected_process_path
            .iter()
            .chain(self.state.last_known_path.iter())
            .chain(sighted)
            .find(|p| p.is_file())
            .cloned()
    }

    fn wait_for_exit(&mut self, pids: &[u32]) {
        let deadline = Instant::now() + self.config.kill_wait;
        loop {
            let remaining: Vec<u32> = pids
                .iter()
                .copied()
                .filter(|pid| self.table.is_alive(*pid))
                .collect();
            if remaining.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                warn!("Processes {:?} still present after {:?}", remaining, self.config.kill_wait);
                return;
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn clean_up_holding(&self, report: &mut RestoreReport) -> anyhow::Result<()> {
        report.record_deleted = storage::delete_record(&self.config.state_file())?;

        let dir = &self.config.holding_dir;
        if relocate::dir_is_empty(dir).with_context(|| format!("read {}", dir.display()))? {
            fs::remove_dir(dir).with_context(|| format!("remove {}", dir.display()))?;
            report.holding_dir = HoldingCleanup::Removed;
            info!("Removed empty holding directory {}", dir.display());
        } else {
            report.holding_dir = HoldingCleanup::KeptNonEmpty;
            debug!("Holding directory {} not empty, kept", dir.display());
        }
        Ok(())
    }
}

/// Whether `file` sits directly inside `dir`, with symlinks and `..` resolved.
fn is_directly_in(dir: &Path, file: &Path) -> bool {
    let parent = match file.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return false,
    };
    if parent == dir {
        return true;
    }
    match (fs::canonicalize(parent), fs::canonicalize(dir)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
