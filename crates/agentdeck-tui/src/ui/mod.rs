use agentdeck_wire::Mode;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus, Modal};

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(24),
            Constraint::Min(30),
            Constraint::Percentage(42),
        ])
        .split(rows[0]);

    draw_sidebar(f, app, columns[0]);
    draw_chat(f, app, columns[1]);
    draw_workspace(f, app, columns[2]);
    draw_status_bar(f, app, rows[1]);

    if let Some(modal) = &app.modal {
        draw_modal(f, modal);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "agentdeck",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("Modes", Style::default().fg(Color::Gray))),
    ];
    for mode in Mode::ALL {
        let style = if mode == app.mode {
            Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(Span::styled(format!(" {} ", mode.label()), style)));
    }

    lines.push(Line::from(""));
    let session = if app.session.is_active() {
        Span::styled(
            format!("Working {}", spinner_frame(app.tick_count)),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::styled("Idle", Style::default().fg(Color::Gray))
    };
    lines.push(Line::from(vec![Span::raw("Session: "), session]));
    let thread = app.session.thread_id();
    lines.push(Line::from(Span::styled(
        format!("Thread {}", &thread[..8.min(thread.len())]),
        Style::default().fg(Color::DarkGray),
    )));

    lines.push(Line::from(""));
    for hint in [
        "Tab   focus",
        "F2    mode",
        "^N    new chat",
        "^R    refresh",
        "^S    save",
        "Esc   cancel",
        "^C    quit",
    ] {
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    }

    let sidebar = Paragraph::new(lines).block(Block::default().borders(Borders::RIGHT));
    f.render_widget(sidebar, area);
}

fn draw_chat(f: &mut Frame, app: &App, area: Rect) {
    let composer_lines = u16::try_from(app.composer.line_count()).unwrap_or(u16::MAX);
    let composer_height = composer_lines.saturating_add(2).clamp(3, 8);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(composer_height)])
        .split(area);

    let block = Block::default().borders(Borders::ALL).title("Trace");
    let inner = block.inner(chunks[0]);
    f.render_widget(block, chunks[0]);

    let width = inner.width.max(1) as usize;
    let mut lines: Vec<Line> = Vec::new();
    if app.session.messages().is_empty() && !app.session.is_active() {
        lines.push(Line::from(Span::styled(
            "Select a mode and start a task.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for message in app.session.messages().as_slice() {
        let (prefix, prefix_style, body_style) = if message.is_user() {
            ("> ".to_string(), Style::default().fg(Color::Cyan), Style::default().fg(Color::Cyan))
        } else if let Some(agent) = message.agent() {
            (
                format!("[{agent}] "),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
                Style::default(),
            )
        } else {
            (String::new(), Style::default(), Style::default().fg(Color::Red))
        };
        lines.push(Line::from(Span::styled(prefix, prefix_style)));
        for row in wrap_text(message.content(), width) {
            lines.push(Line::from(Span::styled(row, body_style)));
        }
        lines.push(Line::from(""));
    }
    if app.session.is_active() {
        lines.push(Line::from(Span::styled(
            format!("{} Agent is working...", spinner_frame(app.tick_count)),
            Style::default().fg(Color::Yellow),
        )));
    }

    let height = inner.height as usize;
    let bottom = lines.len().saturating_sub(height);
    let offset = bottom.saturating_sub(app.chat_scroll as usize);
    let trace = Paragraph::new(lines).scroll((offset.min(u16::MAX as usize) as u16, 0));
    f.render_widget(trace, inner);

    draw_composer(f, app, chunks[1]);
}

fn draw_composer(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Composer;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title(format!("Message ({})", app.mode.label()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let composer = if app.session.is_active() {
        Paragraph::new("Waiting for the agent...").style(Style::default().fg(Color::DarkGray))
    } else if app.composer.is_empty() {
        Paragraph::new(format!("Type a message in {} mode...", app.mode))
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(app.composer.text())
    };
    f.render_widget(composer, inner);

    if focused && !app.session.is_active() {
        let (line, column) = app.composer.cursor_position();
        if let Some(cell) = cursor_cell(inner, 0, line, column) {
            f.set_cursor_position(cell);
        }
    }
}

fn draw_workspace(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(35), Constraint::Min(5)])
        .split(area);
    draw_tree(f, app, chunks[0]);
    draw_editor(f, app, chunks[1]);
}

fn draw_tree(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Tree;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title("Workspace");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let forest = app.workspace.tree();
    if forest.is_empty() {
        f.render_widget(
            Paragraph::new("No files. Ctrl-R to refresh.").style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let selected_path = app.workspace.selected().map(|node| node.path.as_str());
    let rows = app.tree.rows(forest);
    let height = inner.height.max(1) as usize;
    let start = app.tree.cursor().saturating_sub(height - 1);
    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(start)
        .take(height)
        .map(|(index, row)| {
            let marker = match (row.node.is_dir(), row.expanded) {
                (true, true) => "v ",
                (true, false) => "> ",
                (false, _) => "  ",
            };
            let mut style = if row.node.is_dir() {
                Style::default().fg(Color::Blue)
            } else {
                Style::default().fg(Color::Gray)
            };
            if selected_path == Some(row.node.path.as_str()) {
                style = style.fg(Color::White).add_modifier(Modifier::BOLD);
            }
            if focused && index == app.tree.cursor() {
                style = style.bg(Color::DarkGray);
            }
            Line::from(Span::styled(
                format!("{}{}{}", "  ".repeat(row.depth), marker, row.node.name),
                style,
            ))
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_editor(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Editor;
    let title = match app.workspace.selected() {
        Some(node) => format!(
            "{} | {}{}",
            node.path,
            app.workspace.language(),
            if app.workspace.is_dirty() { " [+]" } else { "" }
        ),
        None => "Editor".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(focused))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.workspace.selected().is_none() {
        f.render_widget(
            Paragraph::new("Select a file to view its content")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let (line, column) = app.editor.cursor_position();
    let height = inner.height.max(1) as usize;
    let top = line.saturating_sub(height - 1);
    let gutter = 5u16;
    let lines: Vec<Line> = app
        .editor
        .text()
        .split('\n')
        .enumerate()
        .skip(top)
        .take(height)
        .map(|(number, text)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>4} ", number + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(text.to_string()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);

    if focused {
        if let Some(cell) = cursor_cell(inner, gutter, line - top, column) {
            f.set_cursor_position(cell);
        }
    }
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.status {
        Some(status) => format!(" {status}"),
        None => format!(" {} | {} ", app.mode.label(), focus_label(app.focus)),
    };
    let status = Paragraph::new(text).style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(status, area);
}

fn focus_label(focus: Focus) -> &'static str {
    match focus {
        Focus::Composer => "chat",
        Focus::Tree => "files",
        Focus::Editor => "editor",
    }
}

fn draw_modal(f: &mut Frame, modal: &Modal) {
    let (title, message, color) = match modal {
        Modal::ConfirmDiscard { .. } => (
            "Unsaved changes",
            "Discard unsaved changes? (y/n)".to_string(),
            Color::Yellow,
        ),
        Modal::Notice { message, is_error } => (
            if *is_error { "Error" } else { "Notice" },
            message.clone(),
            if *is_error { Color::Red } else { Color::Green },
        ),
    };

    let area = centered_fixed_rect(48, 5, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title);
    let body = Paragraph::new(message)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(body, area);
}

/// Screen cell for a text cursor at `line`/`column` inside `inner`, after
/// `indent` columns. `None` when it falls outside the area.
fn cursor_cell(inner: Rect, indent: u16, line: usize, column: usize) -> Option<(u16, u16)> {
    let dx = u16::try_from(column).ok()?.checked_add(indent)?;
    let dy = u16::try_from(line).ok()?;
    if dx >= inner.width || dy >= inner.height {
        return None;
    }
    Some((inner.x.saturating_add(dx), inner.y.saturating_add(dy)))
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width.max(1));
    let h = height.min(area.height.max(1));
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect::new(x, y, w, h)
}

fn spinner_frame(tick: usize) -> &'static str {
    const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
    FRAMES[tick % FRAMES.len()]
}

/// Hard-wraps at `width` chars so the trace can be scrolled by line count.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            rows.push(chunk.iter().collect());
        }
    }
    rows
}
