use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use ourschool_core::utils::{format_remaining, truncate_string};

use crate::app::{App, AppState};

use super::styles;

/// Longest name shown in the title bar before truncation
const MAX_NAME_WIDTH: usize = 32;

pub fn render(frame: &mut Frame, app: &App) {
    let show_banner = app.snapshot.show_warning;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                             // Title bar
            Constraint::Length(if show_banner { 3 } else { 0 }), // Warning banner
            Constraint::Min(6),                                // Session panel
            Constraint::Length(2),                             // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    if show_banner {
        render_warning_banner(frame, app, chunks[1]);
    }
    render_session_panel(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    if app.state == AppState::ShowingHelp {
        render_help_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  OurSchool";
    let user = app
        .snapshot
        .user
        .as_ref()
        .map(|u| truncate_string(&u.full_name(), MAX_NAME_WIDTH))
        .unwrap_or_default();
    let padding = (area.width as usize).saturating_sub(title.len() + user.chars().count() + 2);

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(user, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_warning_banner(frame: &mut Frame, app: &App, area: Rect) {
    let text = format!(
        " Your session expires in {}. Press [e] to stay signed in, [d] to dismiss.",
        app.snapshot.time_remaining_display()
    );
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    let paragraph = Paragraph::new(Line::from(Span::styled(text, styles::warning_banner_style())))
        .block(block);
    frame.render_widget(paragraph, area);
}

fn render_session_panel(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = &app.snapshot;
    let controller = app.controller();

    let (state_text, state_style) = if snapshot.is_authenticated() {
        if snapshot.show_warning {
            ("Expiring soon", styles::highlight_style())
        } else {
            ("Active", styles::success_style())
        }
    } else {
        ("Signed out", styles::error_style())
    };

    let idle = controller
        .activity()
        .time_since_last_activity()
        .map(format_remaining)
        .unwrap_or_else(|| "no activity yet".to_string());

    let mut lines = vec![row("Status", Span::styled(state_text, state_style))];
    if let Some(user) = &snapshot.user {
        lines.push(row("User", Span::raw(format!("{} ({})", user.full_name(), user.username))));
        lines.push(row("Email", Span::raw(user.email.clone())));
        let role = if user.is_admin() { "Administrator" } else { "Student" };
        lines.push(row("Role", Span::raw(role)));
    }
    lines.push(row("Expires in", Span::raw(snapshot.time_remaining_display())));
    lines.push(row("Idle for", Span::raw(idle)));

    let block = Block::default()
        .title(" Session ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn row<'a>(label: &'a str, value: Span<'a>) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", label), styles::muted_style()),
        value,
    ])
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[e]xtend | [r]efresh | [?] help | [q]uit";
    let left_text = format!(" {} ", app.status_message.as_deref().unwrap_or("Watching session"));
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 11, frame.area());
    frame.render_widget(Clear, area);

    let keys = [
        ("e", "Extend the session now"),
        ("d", "Dismiss the expiry warning"),
        ("r", "Reload the session from storage"),
        ("?", "Toggle this help"),
        ("q", "Quit (stays signed in)"),
    ];
    let mut lines = vec![
        Line::from(Span::styled("   Keys", styles::title_style())),
        Line::from(""),
    ];
    lines.extend(keys.iter().map(|(key, desc)| {
        Line::from(vec![
            Span::styled(format!("   [{}] ", key), styles::help_key_style()),
            Span::styled(*desc, styles::help_desc_style()),
        ])
    }));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
