//! Failures an operation reports back to its caller.
//!
//! The `Display` text of each variant is exactly what the caller shows.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    // OS query
    #[error("Failed to query the process table: {0}")]
    ProcessQuery(String),

    // Permission / IO
    #[error("Failed to terminate process {pid}: {reason}")]
    Kill { pid: u32, reason: String },

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete existing file {}: {source}", path.display())]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read holding directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // State consistency
    #[error("No {target} process is running")]
    NotRunning { target: String },

    #[error("Cannot determine the location of {target}")]
    LocationUnknown { target: String },

    #[error("{} is already inside the holding directory", path.display())]
    AlreadyHeld { path: PathBuf },

    #[error("Holding directory {} does not exist", path.display())]
    HoldingDirMissing { path: PathBuf },

    #[error("No original-path record found, cannot restore {target}")]
    NoRecord { target: String },

    #[error("{target} was not found in holding directory {}", dir.display())]
    FileNotInHolding { target: String, dir: PathBuf },
}
