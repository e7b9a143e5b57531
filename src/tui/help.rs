use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key_line(key: &str, pad: usize, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, target: &str, holding_dir: &str) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (waits for a running operation)"),
        ]),
        key_line("r", 11, "Refresh status"),
        key_line("k", 11, "Kill processes and move the file to the holding directory"),
        key_line("u", 11, "Restore the file to its original location"),
        key_line("y/n", 9, "Answer a confirmation prompt"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Target:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(target.to_string(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from("Holding directory:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(holding_dir.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
