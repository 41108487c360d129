// Composer widget: single-line message input with a block cursor.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::tui::ViewState;

const CURSOR: &str = "█";

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (title, border) = if state.is_pending() {
        (" Message (waiting for reply) ", Style::default().fg(Color::Yellow))
    } else {
        (" Message ", Style::default().fg(Color::Cyan))
    };

    let inner_width = area.width.saturating_sub(2) as usize;
    // Leave a column for the cursor.
    let visible = visible_tail(&state.composer, inner_width.saturating_sub(1));
    let input_active = state.credential_form.is_none() && !state.confirm_quit;

    let mut spans = vec![Span::raw(visible)];
    if input_active {
        spans.push(Span::styled(CURSOR, Style::default().fg(Color::Gray)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title),
    );
    frame.render_widget(paragraph, area);
}

/// The last `width` characters of `text`, so the cursor end stays visible.
pub fn visible_tail(text: &str, width: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(width)).collect()
}
