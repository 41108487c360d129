// Credential form overlay: three labeled fields, the focused one highlighted.
// The API key is always masked.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;
use crate::tui::{CredentialForm, FormField};

const DIALOG_WIDTH: u16 = 60;
const DIALOG_HEIGHT: u16 = 10;
const MASK: char = '•';
const LABEL_WIDTH: usize = 14;

pub fn render(frame: &mut Frame, area: Rect, form: &CredentialForm) {
    let dialog_area = centered_rect(DIALOG_WIDTH, DIALOG_HEIGHT, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " Credentials ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let mut lines = vec![Line::raw("")];
    for field in FormField::ALL {
        lines.push(field_line(form, field));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "  Leave the channel token empty to generate one.",
        Style::default().fg(Color::DarkGray),
    ));
    lines.push(Line::styled(
        "  Tab: next field  Enter: save  Esc: cancel",
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

fn field_line(form: &CredentialForm, field: FormField) -> Line<'static> {
    let focused = form.focused() == field;
    let label_style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let marker = if focused { "> " } else { "  " };
    let mut value = display_value(field, form.value(field));
    if focused {
        value.push('█');
    }

    Line::from(vec![
        Span::styled(marker, label_style),
        Span::styled(format!("{:<LABEL_WIDTH$}", field.label()), label_style),
        Span::raw(value),
    ])
}

/// What the form shows for a field value.
pub fn display_value(field: FormField, value: &str) -> String {
    match field {
        FormField::ApiKey => MASK.to_string().repeat(value.chars().count()),
        _ => value.to_string(),
    }
}
