// Normalized relay outcome and the error taxonomy that feeds it.

use std::time::Duration;

use thiserror::Error;

pub const MISSING_CREDENTIALS: &str = "Missing API credentials.";

// ---------------------------------------------------------------------------
// RelayError
// ---------------------------------------------------------------------------

/// Everything that can go wrong inside a relay call. Never escapes
/// `Relay::send`; it is converted into a [`RelayFailure`] at the boundary.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing API credentials.")]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("Request timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("{status} {reason} error for url: {url}")]
    HttpStatus {
        status: u16,
        reason: String,
        url: String,
        body: Option<String>,
    },

    /// 2xx reply whose body carried an `error` field (opt-in policy).
    #[error("{message}")]
    ErrorField { status: u16, message: String },

    #[error("invalid hook URL: {0}")]
    InvalidUrl(String),
}

impl RelayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RelayError::MissingCredentials { .. } => FailureKind::Credential,
            RelayError::Timeout(_)
            | RelayError::Connect(_)
            | RelayError::Transport(_)
            | RelayError::InvalidUrl(_) => FailureKind::Transport,
            RelayError::HttpStatus { .. } | RelayError::ErrorField { .. } => {
                FailureKind::HttpStatus
            }
        }
    }
}

fn format_timeout(timeout: &Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

// ---------------------------------------------------------------------------
// RelayResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// One or more credential fields were empty; no request was made.
    Credential,
    /// No HTTP response was obtained.
    Transport,
    /// A response arrived with a non-success status.
    HttpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub details: Option<String>,
}

impl From<RelayError> for RelayFailure {
    fn from(err: RelayError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let (status_code, details) = match err {
            RelayError::HttpStatus { status, body, .. } => (Some(status), body),
            RelayError::ErrorField { status, .. } => (Some(status), None),
            _ => (None, None),
        };
        RelayFailure {
            kind,
            message,
            status_code,
            details,
        }
    }
}

/// Outcome of one relay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResult {
    Success { text: String },
    Failure(RelayFailure),
}

impl RelayResult {
    pub fn success(text: impl Into<String>) -> Self {
        RelayResult::Success { text: text.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RelayResult::Success { .. })
    }

    pub fn failure(&self) -> Option<&RelayFailure> {
        match self {
            RelayResult::Failure(f) => Some(f),
            RelayResult::Success { .. } => None,
        }
    }

    /// Text shown as the assistant turn. Failures get an error prefix and
    /// their details in a fenced block.
    pub fn to_reply_text(&self) -> String {
        match self {
            RelayResult::Success { text } => text.clone(),
            RelayResult::Failure(failure) => {
                let mut reply = format!("❌ Error: {}", failure.message);
                if let Some(details) = failure.details.as_deref().filter(|d| !d.is_empty()) {
                    reply.push_str("\n\n```\n");
                    reply.push_str(details);
                    reply.push_str("\n```");
                }
                reply
            }
        }
    }
}

impl From<Result<String, RelayError>> for RelayResult {
    fn from(result: Result<String, RelayError>) -> Self {
        match result {
            Ok(text) => RelayResult::Success { text },
            Err(err) => RelayResult::Failure(err.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
