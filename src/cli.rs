use crate::manager::ProcessFileManager;
use crate::model::{ManagerConfig, Operation, OperationOutcome};
use crate::orchestrator::{run_operation, SharedManager};
use crate::process_table::SystemProcessTable;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_TARGET: &str = "8021x.exe";

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "exe-stash",
    version,
    about = "Stop a running executable, park it in a holding directory, and restore it later"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Executable name to manage (matched case-insensitively)
    #[arg(long, global = true, default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Holding directory for the parked executable and its state file
    #[arg(long, global = true)]
    pub holding_dir: Option<PathBuf>,

    /// How long to wait for killed processes to exit before moving the file
    #[arg(long, global = true, default_value = "2s")]
    pub kill_wait: humantime::Duration,

    /// Do not ask for confirmation before destructive operations
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Print the structured outcome as JSON (no TUI)
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Report whether the executable is running or parked
    Status,
    /// Terminate the executable and move it into the holding directory
    Stash,
    /// Move the parked executable back to its original location
    Restore,
}

impl Command {
    fn operation(self) -> Operation {
        match self {
            Command::Status => Operation::Refresh,
            Command::Stash => Operation::KillAndMove,
            Command::Restore => Operation::Restore,
        }
    }
}

impl Cli {
    /// True when the run will end up in the TUI.
    pub fn is_interactive(&self) -> bool {
        cfg!(feature = "tui") && self.command.is_none() && !self.json
    }
}

/// Default holding directory when `--holding-dir` is not given.
#[cfg(windows)]
fn default_holding_dir() -> Result<PathBuf> {
    Ok(PathBuf::from(r"D:\临时存放"))
}

#[cfg(not(windows))]
fn default_holding_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("could not determine local data directory")?;
    Ok(base.join("exe-stash").join("holding"))
}

/// Build a `ManagerConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<ManagerConfig> {
    let holding_dir = match &args.holding_dir {
        Some(dir) => dir.clone(),
        None => default_holding_dir()?,
    };
    Ok(ManagerConfig {
        target_name: args.target.clone(),
        holding_dir,
        kill_wait: Duration::from(args.kill_wait),
    })
}

/// Run the requested mode. Returns `false` when the operation did not succeed.
pub async fn run(args: Cli) -> Result<bool> {
    crate::logging::init(args.debug, args.log_file.as_deref(), args.is_interactive())?;

    let config = build_config(&args)?;
    tracing::debug!(
        "target={} holding_dir={} kill_wait={:?}",
        config.target_name,
        config.holding_dir.display(),
        config.kill_wait
    );
    let manager: SharedManager<SystemProcessTable> = Arc::new(Mutex::new(
        ProcessFileManager::new(config, SystemProcessTable::new()),
    ));

    if args.is_interactive() {
        #[cfg(feature = "tui")]
        {
            crate::tui::run(manager).await?;
            return Ok(true);
        }
    }

    let op = args
        .command
        .map(Command::operation)
        .unwrap_or(Operation::Refresh);
    run_once(&args, manager, op).await
}

/// Run a single operation, printing its outcome.
async fn run_once(
    args: &Cli,
    manager: SharedManager<SystemProcessTable>,
    op: Operation,
) -> Result<bool> {
    if let Some(question) = op.confirm_prompt(&args.target) {
        if !args.yes && !confirm(question).await? {
            eprintln!("Cancelled");
            return Ok(false);
        }
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let outcome: OperationOutcome = run_operation(manager, op).await;

    let summary = crate::text_summary::build_text_summary(&outcome, args.json)?;
    for line in summary.lines {
        let route = if outcome.ok || args.json {
            OutputLine::Stdout(line)
        } else {
            OutputLine::Stderr(line)
        };
        let _ = out_tx.send(route);
    }
    drop(out_tx);
    let _ = out_handle.await;

    Ok(outcome.ok)
}

/// Ask a yes/no question on the terminal. Anything but "y"/"yes" is a no.
async fn confirm(question: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let mut err = std::io::stderr();
        write!(err, "{question} [y/N] ")?;
        err.flush()?;
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("read confirmation")?;
        Ok(is_yes(&answer))
    })
    .await
    .context("confirmation prompt task failed")?
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_map_to_operations() {
        let args = Cli::parse_from(["exe-stash", "stash", "--yes", "--holding-dir", "/tmp/h"]);
        assert_eq!(args.command, Some(Command::Stash));
        assert!(args.yes);
        assert!(!args.is_interactive());
        assert_eq!(Command::Stash.operation(), Operation::KillAndMove);
        assert_eq!(Command::Status.operation(), Operation::Refresh);
    }

    #[test]
    fn config_uses_flags_and_defaults() {
        let args = Cli::parse_from([
            "exe-stash",
            "--holding-dir",
            "/srv/hold",
            "--kill-wait",
            "750ms",
            "status",
        ]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.target_name, DEFAULT_TARGET);
        assert_eq!(cfg.holding_dir, PathBuf::from("/srv/hold"));
        assert_eq!(cfg.kill_wait, Duration::from_millis(750));
        assert_eq!(cfg.state_file(), PathBuf::from("/srv/hold/original_path.json"));
    }

    #[test]
    fn confirmation_accepts_only_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
