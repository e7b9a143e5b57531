use crate::model::{display_opt, ManagerState, Operation, OperationOutcome, UiEvent};
use std::time::Instant;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub target: String,
    pub holding_dir: String,

    /// Destructive operation waiting for a y/n answer.
    pub pending_confirm: Option<Operation>,
    pub busy: Option<Operation>,
    pub busy_since: Option<Instant>,

    /// First paragraph of the most recent refresh.
    pub status_text: String,
    /// Full text of the most recent outcome.
    pub detail_text: String,
    pub last_ok: Option<bool>,
    pub manager_state: ManagerState,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            target: String::new(),
            holding_dir: String::new(),
            pending_confirm: None,
            busy: None,
            busy_since: None,
            status_text: String::new(),
            detail_text: String::new(),
            last_ok: None,
            manager_state: ManagerState::default(),
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Started { operation } => {
                self.busy = Some(operation);
                self.busy_since = Some(Instant::now());
                self.info = format!("{}…", operation.label());
            }
            UiEvent::Finished { outcome } => self.apply_outcome(*outcome),
            UiEvent::Info(msg) => self.info = msg,
        }
    }

    fn apply_outcome(&mut self, outcome: OperationOutcome) {
        self.busy = None;
        self.busy_since = None;
        self.last_ok = Some(outcome.ok);
        self.info = if outcome.ok {
            format!("{}: done", outcome.operation.label())
        } else {
            format!("{}: failed", outcome.operation.label())
        };
        if outcome.operation == Operation::Refresh {
            self.status_text = first_paragraph(&outcome.message).to_string();
        }
        self.detail_text = outcome.message;
        self.manager_state = outcome.state;
    }

    pub fn spinner(&self) -> &'static str {
        let ticks = self
            .busy_since
            .map(|t| (t.elapsed().as_millis() / 150) as usize)
            .unwrap_or(0);
        SPINNER[ticks % SPINNER.len()]
    }

    /// Key/value rows for the state panel.
    pub fn state_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Target", self.target.clone()),
            ("Holding directory", self.holding_dir.clone()),
            (
                "Detected path",
                display_opt(self.manager_state.detected_process_path.as_deref()),
            ),
            (
                "Last known path",
                display_opt(self.manager_state.last_known_path.as_deref()),
            ),
            (
                "Original path",
                display_opt(self.manager_state.original_path.as_deref()),
            ),
        ]
    }
}

fn first_paragraph(text: &str) -> &str {
    text.split("\n\n").next().unwrap_or(text)
}
