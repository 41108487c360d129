// Terminal chat UI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors the parts of the session it shows.
// The app orchestrator pushes `UiUpdate` messages over an mpsc channel; the
// TUI applies them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vextchat_core::credentials::{CredentialBundle, CredentialSource, CredentialSummary};
use vextchat_core::protocol::{RelayStatus, SessionSnapshot, UiUpdate, UserCommand};
use vextchat_core::transcript::ChatTurn;

use layout::{build_layout, AppLayout};

// ---------------------------------------------------------------------------
// CredentialForm
// ---------------------------------------------------------------------------

/// Field order in the credential form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    ApiKey,
    ChannelToken,
    EndpointId,
}

impl FormField {
    pub const ALL: [FormField; 3] = [
        FormField::ApiKey,
        FormField::ChannelToken,
        FormField::EndpointId,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::ApiKey => "API key",
            FormField::ChannelToken => "Channel token",
            FormField::EndpointId => "Endpoint ID",
        }
    }
}

/// Edit buffer behind the credential overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialForm {
    pub api_key: String,
    pub channel_token: String,
    pub endpoint_id: String,
    /// Index into [`FormField::ALL`].
    pub focus: usize,
}

impl CredentialForm {
    pub fn focused(&self) -> FormField {
        FormField::ALL[self.focus % FormField::ALL.len()]
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::ApiKey => &self.api_key,
            FormField::ChannelToken => &self.channel_token,
            FormField::EndpointId => &self.endpoint_id,
        }
    }

    pub fn focused_value_mut(&mut self) -> &mut String {
        match self.focused() {
            FormField::ApiKey => &mut self.api_key,
            FormField::ChannelToken => &mut self.channel_token,
            FormField::EndpointId => &mut self.endpoint_id,
        }
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % FormField::ALL.len();
    }

    pub fn prev_field(&mut self) {
        self.focus = (self.focus + FormField::ALL.len() - 1) % FormField::ALL.len();
    }

    /// Trimmed field values as a bundle.
    pub fn to_bundle(&self) -> CredentialBundle {
        CredentialBundle::new(
            self.api_key.trim(),
            self.channel_token.trim(),
            self.endpoint_id.trim(),
        )
    }
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state that mirrors the session for rendering.
///
/// Updated incrementally via `UiUpdate` messages from the app orchestrator.
/// The `render_frame` function reads this struct to draw the screen.
#[derive(Debug)]
pub struct ViewState {
    pub title: String,
    pub environment: String,
    /// `None` until the first snapshot arrives.
    pub credentials: Option<CredentialSummary>,
    pub relay_status: RelayStatus,
    /// Local copy of the transcript, in arrival order.
    pub turns: Vec<ChatTurn>,
    /// Text being composed.
    pub composer: String,
    /// Transcript lines scrolled up from the bottom. 0 follows the tail.
    pub scroll_offset: usize,
    /// Last notice from the orchestrator or the input handler.
    pub notice: Option<String>,
    /// Open credential overlay, if any.
    pub credential_form: Option<CredentialForm>,
    /// Whether the quit confirmation dialog is showing.
    pub confirm_quit: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            title: "Chat".to_string(),
            environment: String::new(),
            credentials: None,
            relay_status: RelayStatus::Idle,
            turns: Vec::new(),
            composer: String::new(),
            scroll_offset: 0,
            notice: None,
            credential_form: None,
            confirm_quit: false,
        }
    }
}

impl ViewState {
    /// Apply a session snapshot. The local transcript copy is left alone.
    pub fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.title = snapshot.title;
        self.environment = snapshot.environment;
        self.credentials = Some(snapshot.credentials);
        self.relay_status = snapshot.relay_status;
    }

    pub fn is_pending(&self) -> bool {
        self.relay_status == RelayStatus::Pending
    }

    /// True when credentials may be edited from the UI.
    pub fn credentials_editable(&self) -> bool {
        self.credentials
            .map(|c| c.source == CredentialSource::Interactive)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Snapshot(snapshot) => {
            state.apply_snapshot(*snapshot);
        }
        UiUpdate::TurnAppended(turn) => {
            state.turns.push(turn);
            // Jump back to the newest turn.
            state.scroll_offset = 0;
        }
        UiUpdate::RelayStatus(status) => {
            state.relay_status = status;
        }
        UiUpdate::Notice(text) => {
            state.notice = Some(text);
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame: panels first, then any overlay on top.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::transcript::render(frame, layout.transcript, state);
    widgets::composer::render(frame, layout.composer, state);
    render_help_bar(frame, &layout, state);

    if let Some(form) = &state.credential_form {
        widgets::credentials_form::render(frame, frame.area(), form);
    }
    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let line = match &state.notice {
        Some(notice) => Line::from(Span::styled(
            format!(" {notice}"),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(
            help_text(state),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::DIM),
        )),
    };
    let paragraph = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

/// Key hints for the current mode.
pub fn help_text(state: &ViewState) -> &'static str {
    if state.confirm_quit {
        " y:Quit | n/Esc:Cancel"
    } else if state.credential_form.is_some() {
        " Tab/Up/Down:Field | Enter:Save | Esc:Cancel"
    } else if state.credentials_editable() {
        " Enter:Send | PgUp/PgDn:Scroll | Ctrl+K:Credentials | Esc:Quit"
    } else {
        " Enter:Send | PgUp/PgDn:Scroll | Esc:Quit"
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// This is the main entry point for the terminal UI. It:
/// 1. Initializes the terminal (enters raw mode, enables alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            // UI updates from the app orchestrator
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    None => {
                        info!("UI channel closed, leaving the TUI");
                        break Ok(());
                    }
                }
            }

            // Keyboard input
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            if cmd_tx.send(cmd).await.is_err() {
                                warn!("Command channel closed");
                                break Ok(());
                            }
                            if quit {
                                break Ok(());
                            }
                        }
                    }
                    Some(Ok(_)) => {
                        // Mouse, resize, focus: the next tick redraws.
                    }
                    Some(Err(e)) => {
                        break Err(anyhow::Error::from(e).context("terminal input error"));
                    }
                    None => break Ok(()),
                }
            }

            // Render tick
            _ = render_tick.tick() => {
                if let Err(e) = terminal.draw(|frame| render_frame(frame, &view_state)) {
                    break Err(anyhow::Error::from(e).context("failed to draw frame"));
                }
            }
        }
    };

    ratatui::restore();
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
