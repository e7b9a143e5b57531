//! Application-level orchestration.
//!
//! `runner` executes a single manager operation off the interactive thread and turns
//! whatever happens into one outcome. `controller` sits between the TUI and the runner
//! and makes sure only one operation is in flight at a time.

#[cfg(feature = "tui")]
mod controller;
mod runner;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use runner::{run_operation, SharedManager};
