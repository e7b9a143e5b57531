//! Access to the OS process table.
//!
//! The manager only talks to [`ProcessTable`]; the live implementation is backed by
//! `sysinfo`, tests plug in an in-memory table.

use crate::error::OperationError;
use crate::model::ProcessRecord;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

pub trait ProcessTable: Send {
    /// Snapshot every running process.
    fn list(&mut self) -> Result<Vec<ProcessRecord>, OperationError>;

    /// Forcefully terminate one process.
    fn kill(&mut self, pid: u32) -> Result<(), OperationError>;

    fn is_alive(&mut self, pid: u32) -> bool;
}

/// Processes whose executable name equals `target_name` (case-insensitive), ordered by pid.
pub fn find_matching<T: ProcessTable + ?Sized>(
    table: &mut T,
    target_name: &str,
) -> Result<Vec<ProcessRecord>, OperationError> {
    let mut found: Vec<ProcessRecord> = table
        .list()?
        .into_iter()
        .filter(|p| p.matches(target_name))
        .collect();
    found.sort_by_key(|p| p.pid);
    debug!("{} process(es) named {}", found.len(), target_name);
    Ok(found)
}

pub struct SystemProcessTable {
    system: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn list(&mut self) -> Result<Vec<ProcessRecord>, OperationError> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        );

        let records: Vec<ProcessRecord> = self
            .system
            .processes()
            .iter()
            .map(|(pid, proc)| ProcessRecord {
                pid: pid.as_u32(),
                name: proc.name().to_string_lossy().into_owned(),
                exe: proc.exe().map(|p| p.to_path_buf()),
            })
            .collect();

        if records.is_empty() {
            return Err(OperationError::ProcessQuery(
                "process table came back empty".into(),
            ));
        }
        Ok(records)
    }

    fn kill(&mut self, pid: u32) -> Result<(), OperationError> {
        match self.system.process(Pid::from_u32(pid)) {
            // Already gone between listing and killing.
            None => {
                debug!("Process {} exited before it could be killed", pid);
                Ok(())
            }
            Some(proc) => {
                if proc.kill() {
                    Ok(())
                } else {
                    Err(OperationError::Kill {
                        pid,
                        reason: "the kill signal could not be delivered".into(),
                    })
                }
            }
        }
    }

    fn is_alive(&mut self, pid: u32) -> bool {
        let sys_pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new(),
        );
        self.system
            .process(sys_pid)
            .map(|p| p.status() != ProcessStatus::Zombie)
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory process table. Killing a process removes it immediately unless
    /// `linger` is set, in which case killed pids keep reporting alive.
    #[derive(Default)]
    pub struct FakeProcessTable {
        pub processes: BTreeMap<u32, ProcessRecord>,
        pub fail_list: bool,
        pub refuse_kill: Vec<u32>,
        pub linger: bool,
        pub killed: Vec<u32>,
    }

    impl FakeProcessTable {
        pub fn with(records: Vec<ProcessRecord>) -> Self {
            Self {
                processes: records.into_iter().map(|r| (r.pid, r)).collect(),
                ..Default::default()
            }
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn list(&mut self) -> Result<Vec<ProcessRecord>, OperationError> {
            if self.fail_list {
                return Err(OperationError::ProcessQuery("access denied".into()));
            }
            Ok(self.processes.values().cloned().collect())
        }

        fn kill(&mut self, pid: u32) -> Result<(), OperationError> {
            if self.refuse_kill.contains(&pid) {
                return Err(OperationError::Kill {
                    pid,
                    reason: "access denied".into(),
                });
            }
            if !self.linger {
                self.processes.remove(&pid);
            }
            self.killed.push(pid);
            Ok(())
        }

        fn is_alive(&mut self, pid: u32) -> bool {
            self.processes.contains_key(&pid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeProcessTable;
    use super::*;
    use std::path::PathBuf;

    fn rec(pid: u32, name: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.into(),
            exe: Some(PathBuf::from(format!("/bin/{name}"))),
        }
    }

    #[test]
    fn find_matching_filters_by_name_ignoring_case() {
        let mut table = FakeProcessTable::with(vec![
            rec(30, "8021x.exe"),
            rec(4, "other.exe"),
            rec(12, "8021X.exe"),
        ]);
        let found = find_matching(&mut table, "8021x.exe").unwrap();
        let pids: Vec<u32> = found.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![12, 30]);
    }

    #[test]
    fn find_matching_propagates_query_failure() {
        let mut table = FakeProcessTable {
            fail_list: true,
            ..Default::default()
        };
        assert!(matches!(
            find_matching(&mut table, "x"),
            Err(OperationError::ProcessQuery(_))
        ));
    }

    #[test]
    fn live_table_sees_current_process() {
        let mut table = SystemProcessTable::new();
        let me = std::process::id();
        let all = table.list().unwrap();
        assert!(all.iter().any(|p| p.pid == me));
        assert!(table.is_alive(me));
    }
}
