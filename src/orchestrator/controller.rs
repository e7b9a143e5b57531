//! Operation lifecycle controller.
//!
//! Accepts operation requests from presentation layers, runs them one at a time, and
//! emits events back.

use super::runner::{run_operation, SharedManager};
use crate::model::{Operation, OperationOutcome, UiEvent, FAULT_PREFIX};
use crate::process_table::ProcessTable;
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(Operation),
    Quit,
}

/// Handle for the operation currently in flight.
struct InFlight {
    operation: Operation,
    handle: Option<JoinHandle<OperationOutcome>>,
}

fn start<T: ProcessTable + 'static>(
    manager: &SharedManager<T>,
    operation: Operation,
    event_tx: &UnboundedSender<UiEvent>,
) -> InFlight {
    let _ = event_tx.send(UiEvent::Started { operation });
    let handle = tokio::spawn(run_operation(manager.clone(), operation));
    InFlight {
        operation,
        handle: Some(handle),
    }
}

/// Serve UI commands until quit. `initial` is run immediately on launch.
pub(crate) async fn run_controller<T: ProcessTable + 'static>(
    manager: SharedManager<T>,
    initial: Option<Operation>,
    event_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut in_flight = initial.map(|op| start(&manager, op, &event_tx));
    let mut quit_pending = false;
    let mut cmd_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if cmd_open => {
                match cmd {
                    Some(UiCommand::Run(op)) => {
                        // No queueing: a request that arrives mid-operation is turned away.
                        if let Some(busy) = &in_flight {
                            let _ = event_tx.send(UiEvent::Info(format!(
                                "{} is still running, try again when it finishes",
                                busy.operation.label()
                            )));
                        } else if !quit_pending {
                            in_flight = Some(start(&manager, op, &event_tx));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Operations cannot be cancelled; wait for the current one to finish.
                        quit_pending = true;
                        cmd_open = false;
                        if in_flight.is_none() {
                            break Ok(());
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut in_flight {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    let operation = in_flight.take().map(|ctx| ctx.operation);
                    let outcome = match join_res {
                        Ok(outcome) => outcome,
                        Err(e) => OperationOutcome {
                            operation: operation.unwrap_or(Operation::Refresh),
                            ok: false,
                            message: format!("{FAULT_PREFIX}operation join failed: {e}"),
                            report: None,
                            state: Default::default(),
                        },
                    };
                    let _ = event_tx.send(UiEvent::Finished { outcome: Box::new(outcome) });
                    if quit_pending {
                        break Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ProcessFileManager;
    use crate::model::{ManagerConfig, ProcessRecord};
    use crate::process_table::fake::FakeProcessTable;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn manager(dir: &TempDir) -> SharedManager<FakeProcessTable> {
        let table = FakeProcessTable::with(vec![ProcessRecord {
            pid: 5,
            name: "8021x.exe".into(),
            exe: None,
        }]);
        let config = ManagerConfig {
            target_name: "8021x.exe".into(),
            holding_dir: dir.path().join("holding"),
            kill_wait: Duration::from_millis(10),
        };
        Arc::new(Mutex::new(ProcessFileManager::new(config, table)))
    }

    #[tokio::test]
    async fn initial_refresh_runs_and_quit_stops_controller() {
        let dir = TempDir::new().unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctrl = tokio::spawn(run_controller(
            manager(&dir),
            Some(Operation::Refresh),
            event_tx,
            cmd_rx,
        ));

        assert!(matches!(
            event_rx.recv().await,
            Some(UiEvent::Started {
                operation: Operation::Refresh
            })
        ));
        match event_rx.recv().await {
            Some(UiEvent::Finished { outcome }) => {
                assert!(outcome.ok);
                assert_eq!(outcome.operation, Operation::Refresh);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn each_request_gets_exactly_one_result() {
        let dir = TempDir::new().unwrap();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(manager(&dir), None, event_tx, cmd_rx));

        cmd_tx.send(UiCommand::Run(Operation::Restore)).unwrap();
        let mut finished = 0;
        while let Some(ev) = event_rx.recv().await {
            if let UiEvent::Finished { outcome } = ev {
                assert!(!outcome.ok);
                assert!(outcome.message.contains("does not exist"));
                finished += 1;
                cmd_tx.send(UiCommand::Quit).unwrap();
            }
        }
        assert_eq!(finished, 1);
        ctrl.await.unwrap().unwrap();
    }
}
