mod help;
mod state;

use crate::model::{Operation, UiEvent};
use crate::orchestrator::{self, SharedManager, UiCommand};
use crate::process_table::SystemProcessTable;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(manager: SharedManager<SystemProcessTable>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let (target, holding_dir) = {
        let guard = manager
            .lock()
            .map_err(|_| anyhow::anyhow!("manager lock poisoned"))?;
        (
            guard.config().target_name.clone(),
            guard.config().holding_dir.display().to_string(),
        )
    };

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle =
        std::thread::spawn(move || run_threaded(target, holding_dir, event_rx, cmd_tx));

    // Refresh once on launch, like pressing `r`.
    let res =
        orchestrator::run_controller(manager, Some(Operation::Refresh), event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    target: String,
    holding_dir: String,
    mut event_rx: UnboundedReceiver<UiEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        target,
        holding_dir,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(op) = state.pending_confirm.take() {
                    match k.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => {
                            let _ = cmd_tx.send(UiCommand::Run(op));
                        }
                        _ => state.info = "Cancelled".into(),
                    }
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => state.tab = (state.tab + 1) % 2,
                    (_, KeyCode::Char('?')) => state.tab = 1,
                    (_, KeyCode::Char('r')) => {
                        let _ = cmd_tx.send(UiCommand::Run(Operation::Refresh));
                    }
                    (_, KeyCode::Char('k')) => {
                        state.tab = 0;
                        state.pending_confirm = Some(Operation::KillAndMove);
                    }
                    (_, KeyCode::Char('u')) => {
                        state.tab = 0;
                        state.pending_confirm = Some(Operation::Restore);
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Manager"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("exe-stash"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_manager(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, &state.target, &state.holding_dir),
    }
}

fn draw_manager(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(7), // Paths
                Constraint::Length(5), // Current status
                Constraint::Min(5),    // Details
                Constraint::Length(3), // Prompt / info line
            ]
            .as_ref(),
        )
        .split(area);

    let label_style = Style::default().fg(Color::Gray);
    let path_lines: Vec<Line> = state
        .state_rows()
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("{label}:"), label_style),
                Span::raw(" "),
                Span::raw(value),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(path_lines).block(Block::default().borders(Borders::ALL).title("State")),
        rows[0],
    );

    f.render_widget(
        Paragraph::new(state.status_text.clone())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Current status"),
            ),
        rows[1],
    );

    let detail_style = match state.last_ok {
        Some(false) => Style::default().fg(Color::Red),
        _ => Style::default(),
    };
    f.render_widget(
        Paragraph::new(state.detail_text.clone())
            .style(detail_style)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Details")),
        rows[2],
    );

    f.render_widget(bottom_line(state), rows[3]);
}

fn bottom_line(state: &UiState) -> Paragraph<'static> {
    let key = Style::default().fg(Color::Magenta);
    let line = if let Some(op) = state.pending_confirm {
        let question = op.confirm_prompt(&state.target).unwrap_or_default();
        Line::from(vec![
            Span::styled(
                question,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled("[y/N]", key),
        ])
    } else if let Some(op) = state.busy {
        Line::from(vec![
            Span::styled(state.spinner(), Style::default().fg(Color::Cyan)),
            Span::raw(format!(" {}…", op.label())),
        ])
    } else {
        Line::from(vec![
            Span::styled("r", key),
            Span::raw(" refresh  "),
            Span::styled("k", key),
            Span::raw(" kill & move  "),
            Span::styled("u", key),
            Span::raw(" restore  "),
            Span::styled("q", key),
            Span::raw(" quit   "),
            Span::styled(state.info.clone(), Style::default().fg(Color::Gray)),
        ])
    };
    Paragraph::new(line).block(Block::default().borders(Borders::ALL))
}
