// Transcript widget: the conversation, newest turn at the bottom.
//
// Each turn renders as a header ("[12:04:51] You") followed by its content.
// Fenced blocks (error details) are dimmed. The view follows the tail unless
// the user has scrolled back.

use chrono::Local;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use vextchat_core::transcript::{ChatTurn, Role};

use crate::tui::ViewState;

const FENCE: &str = "```";
const ERROR_PREFIX: &str = "❌";

/// Render the transcript panel into the given area.
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let title = if state.scroll_offset > 0 {
        " Conversation (scrolled) "
    } else {
        " Conversation "
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    if state.turns.is_empty() {
        let paragraph = Paragraph::new(placeholder_lines(state))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
        return;
    }

    let lines = build_lines(&state.turns);
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2) as usize;
    let total = wrapped_height(&lines, inner_width);
    let top = scroll_top(total, inner_height, state.scroll_offset);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((top.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(paragraph, area);
}

fn placeholder_lines(state: &ViewState) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![Line::styled("Type a message and press Enter.", dim)];
    let incomplete = state.credentials.map(|c| !c.is_complete()).unwrap_or(false);
    if incomplete && state.credentials_editable() {
        lines.push(Line::styled("Press Ctrl+K to enter your credentials first.", dim));
    }
    lines
}

/// Lay out all turns as styled lines, with a blank line between turns.
pub fn build_lines(turns: &[ChatTurn]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, turn) in turns.iter().enumerate() {
        if i > 0 {
            lines.push(Line::raw(""));
        }
        lines.push(header_line(turn));
        push_content(&mut lines, &turn.content);
    }
    lines
}

fn header_line(turn: &ChatTurn) -> Line<'static> {
    let time = turn.sent_at.with_timezone(&Local).format("%H:%M:%S");
    let (label, color) = match turn.role {
        Role::User => ("You", Color::Cyan),
        Role::Assistant if turn.content.starts_with(ERROR_PREFIX) => ("Assistant", Color::Red),
        Role::Assistant => ("Assistant", Color::Green),
    };
    Line::from(vec![
        Span::styled(format!("[{time}] "), Style::default().fg(Color::DarkGray)),
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn push_content(lines: &mut Vec<Line<'static>>, content: &str) {
    let preformatted = Style::default().fg(Color::Gray).add_modifier(Modifier::DIM);
    let mut in_fence = false;
    for raw in content.lines() {
        if raw.trim_start().starts_with(FENCE) {
            in_fence = !in_fence;
            lines.push(Line::styled(raw.to_string(), preformatted));
        } else if in_fence {
            lines.push(Line::styled(raw.to_string(), preformatted));
        } else {
            lines.push(Line::raw(raw.to_string()));
        }
    }
}

/// Rows the lines occupy once word-wrapped to `width` columns, counted with
/// the same wrapper the panel renders with.
pub fn wrapped_height(lines: &[Line<'static>], width: u16) -> usize {
    Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width)
}

/// First visible row given `offset` rows scrolled back from the bottom.
pub fn scroll_top(total: usize, height: usize, offset: usize) -> usize {
    total.saturating_sub(height).saturating_sub(offset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
