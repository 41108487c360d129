// Status bar widget: title, environment, credential and relay indicators.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use vextchat_core::credentials::CredentialSummary;
use vextchat_core::protocol::RelayStatus;

use crate::tui::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [title] | env | [credential indicator] | [relay status] | turns
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let separator = || Span::styled(" | ", Style::default().fg(Color::Gray));

    let mut spans = vec![Span::styled(
        format!(" {}", state.title),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];

    if !state.environment.is_empty() {
        spans.push(separator());
        spans.push(Span::styled(
            format!("env: {}", state.environment),
            Style::default().fg(Color::White),
        ));
    }

    spans.push(separator());
    let (dot, dot_color, label) = credential_indicator(state.credentials.as_ref());
    spans.push(Span::styled(format!("{dot} "), Style::default().fg(dot_color)));
    spans.push(Span::styled(label, Style::default().fg(Color::White)));

    spans.push(separator());
    let (status_text, status_color) = relay_indicator(state.relay_status);
    spans.push(Span::styled(status_text, Style::default().fg(status_color)));

    spans.push(separator());
    spans.push(Span::styled(
        format!("{} turns", state.turns.len()),
        Style::default().fg(Color::White),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Dot, color and label describing the credential bundle.
pub fn credential_indicator(summary: Option<&CredentialSummary>) -> (&'static str, Color, String) {
    match summary {
        None => ("●", Color::DarkGray, "credentials: unknown".to_string()),
        Some(summary) if summary.is_complete() => (
            "●",
            Color::Green,
            format!("credentials: {}", summary.source.label()),
        ),
        Some(summary) => (
            "●",
            Color::Red,
            format!("credentials incomplete ({})", summary.source.label()),
        ),
    }
}

/// Text and color for the relay status.
pub fn relay_indicator(status: RelayStatus) -> (&'static str, Color) {
    match status {
        RelayStatus::Idle => ("ready", Color::Green),
        RelayStatus::Pending => ("waiting for reply...", Color::Yellow),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
