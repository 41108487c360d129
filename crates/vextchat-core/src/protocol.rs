// Messages exchanged between the TUI render loop and the app orchestrator.

use crate::credentials::{CredentialBundle, CredentialSummary};
use crate::transcript::ChatTurn;

/// Whether a relay call is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Idle,
    Pending,
}

/// Session-level state the TUI needs that is not carried by individual turns.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub title: String,
    pub environment: String,
    pub credentials: CredentialSummary,
    pub relay_status: RelayStatus,
    pub turn_count: usize,
}

/// Updates pushed from the app orchestrator to the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Snapshot(Box<SessionSnapshot>),
    /// A turn was appended to the transcript.
    TurnAppended(ChatTurn),
    RelayStatus(RelayStatus),
    /// Transient one-line message for the status bar.
    Notice(String),
}

/// Commands sent from the TUI to the app orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SendMessage(String),
    SetCredentials(CredentialBundle),
    Quit,
}
