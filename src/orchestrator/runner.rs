//! Single-operation runner.
//!
//! Runs one manager operation off the calling task and always hands back exactly one
//! [`OperationOutcome`], whatever happens inside the operation.

use crate::manager::ProcessFileManager;
use crate::model::{Operation, OperationOutcome, Report, FAULT_PREFIX};
use crate::process_table::ProcessTable;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

pub(crate) type SharedManager<T> = Arc<Mutex<ProcessFileManager<T>>>;

/// Run `op` synchronously on the caller's thread.
pub(crate) fn execute<T: ProcessTable>(
    manager: &mut ProcessFileManager<T>,
    op: Operation,
) -> OperationOutcome {
    debug!("Running {:?}", op);
    let result = panic::catch_unwind(AssertUnwindSafe(|| match op {
        Operation::Refresh => manager.refresh_status().map(Report::Status),
        Operation::KillAndMove => manager.kill_and_move().map(Report::Moved),
        Operation::Restore => manager.restore_file().map(Report::Restored),
    }));

    let state = manager.state().clone();
    match result {
        Ok(Ok(report)) => OperationOutcome {
            operation: op,
            ok: true,
            message: report.to_message(),
            report: Some(report),
            state,
        },
        Ok(Err(e)) => OperationOutcome {
            operation: op,
            ok: false,
            message: e.to_string(),
            report: None,
            state,
        },
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            error!("{:?} panicked: {}", op, msg);
            OperationOutcome {
                operation: op,
                ok: false,
                message: format!("{FAULT_PREFIX}{msg}"),
                report: None,
                state,
            }
        }
    }
}

/// Run `op` on the blocking pool. The manager lock is held for the whole operation.
pub(crate) async fn run_operation<T: ProcessTable + 'static>(
    manager: SharedManager<T>,
    op: Operation,
) -> OperationOutcome {
    let handle = tokio::task::spawn_blocking(move || {
        let mut guard = manager.lock().unwrap_or_else(PoisonError::into_inner);
        execute(&mut guard, op)
    });

    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => OperationOutcome {
            operation: op,
            ok: false,
            message: format!("{FAULT_PREFIX}operation task failed: {e}"),
            report: None,
            state: Default::default(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::model::{ManagerConfig, ProcessRecord};
    use crate::process_table::fake::FakeProcessTable;
    use std::time::Duration;
    use tempfile::TempDir;

    struct PanickingTable;

    impl ProcessTable for PanickingTable {
        fn list(&mut self) -> Result<Vec<ProcessRecord>, OperationError> {
            panic!("process table exploded")
        }
        fn kill(&mut self, _pid: u32) -> Result<(), OperationError> {
            Ok(())
        }
        fn is_alive(&mut self, _pid: u32) -> bool {
            false
        }
    }

    fn config(dir: &TempDir) -> ManagerConfig {
        ManagerConfig {
            target_name: "8021x.exe".into(),
            holding_dir: dir.path().join("holding"),
            kill_wait: Duration::from_millis(10),
        }
    }

    #[test]
    fn failures_are_reported_verbatim() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ProcessFileManager::new(config(&dir), FakeProcessTable::default());

        let outcome = execute(&mut mgr, Operation::KillAndMove);
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "No 8021x.exe process is running");
        assert!(outcome.report.is_none());
    }

    #[test]
    fn panics_become_prefixed_error_text() {
        let dir = TempDir::new().unwrap();
        let mut mgr = ProcessFileManager::new(config(&dir), PanickingTable);

        let outcome = execute(&mut mgr, Operation::Refresh);
        assert!(!outcome.ok);
        assert_eq!(outcome.message, "Error: process table exploded");
    }

    #[tokio::test]
    async fn run_operation_delivers_one_outcome_off_thread() {
        let dir = TempDir::new().unwrap();
        let table = FakeProcessTable::with(vec![ProcessRecord {
            pid: 12,
            name: "8021x.exe".into(),
            exe: Some(dir.path().join("8021x.exe")),
        }]);
        let mgr = Arc::new(Mutex::new(ProcessFileManager::new(config(&dir), table)));

        let outcome = run_operation(mgr.clone(), Operation::Refresh).await;
        assert!(outcome.ok);
        assert!(outcome.message.starts_with("Found 1 8021x.exe"));
        assert_eq!(
            outcome.state.detected_process_path,
            Some(dir.path().join("8021x.exe"))
        );
        assert!(mgr.lock().unwrap().state().last_known_path.is_some());
    }

    #[tokio::test]
    async fn manager_survives_a_panicking_operation() {
        let dir = TempDir::new().unwrap();
        let mgr = Arc::new(Mutex::new(ProcessFileManager::new(config(&dir), PanickingTable)));

        let first = run_operation(mgr.clone(), Operation::Refresh).await;
        assert!(!first.ok);
        let second = run_operation(mgr.clone(), Operation::Restore).await;
        assert!(second.message.contains("does not exist"));
    }
}
