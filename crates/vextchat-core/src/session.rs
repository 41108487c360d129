// Session context: the single owner of credentials and transcript for the
// lifetime of the process.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::credentials::{
    generate_session_token, resolve_secret_store, CredentialBundle, CredentialSource,
    CredentialSummary,
};
use crate::transcript::Transcript;

/// Owns everything a chat needs between messages.
///
/// Created once with [`ChatSession::open`] and torn down with
/// [`ChatSession::close`], which hands back the final transcript.
#[derive(Debug)]
pub struct ChatSession {
    pub id: String,
    pub opened_at: DateTime<Utc>,
    pub source: CredentialSource,
    pub environment: String,
    credentials: CredentialBundle,
    transcript: Transcript,
}

impl ChatSession {
    /// Open a session from config, reading credentials from the process
    /// environment when the source is the secret store.
    pub fn open(config: &Config) -> Self {
        Self::open_with_env(config, |var| std::env::var(var).ok())
    }

    /// Like [`ChatSession::open`] with an injected environment lookup.
    pub fn open_with_env<F>(config: &Config, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = config.credentials.source;
        let credentials = match source {
            CredentialSource::Interactive => CredentialBundle::default(),
            CredentialSource::SecretStore => resolve_secret_store(
                &config.secrets,
                config.credentials.generate_channel_token,
                env,
            ),
        };

        let session = ChatSession {
            id: generate_session_token(),
            opened_at: Utc::now(),
            source,
            environment: config.relay.environment.clone(),
            credentials,
            transcript: Transcript::new(),
        };

        info!(
            session_id = %session.id,
            source = source.label(),
            credentials_complete = session.credentials.is_complete(),
            "session opened"
        );
        session
    }

    pub fn credentials(&self) -> &CredentialBundle {
        &self.credentials
    }

    pub fn credential_summary(&self) -> CredentialSummary {
        self.credentials.summary(self.source)
    }

    /// Replace the credential bundle. An empty channel token is filled with a
    /// generated one when `generate_channel_token` is set.
    pub fn set_credentials(&mut self, mut credentials: CredentialBundle, generate_channel_token: bool) {
        if credentials.channel_token.is_empty() && generate_channel_token {
            credentials.channel_token = generate_session_token();
        }
        info!(
            session_id = %self.id,
            missing = ?credentials.missing_fields(),
            "credentials updated"
        );
        self.credentials = credentials;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// End the session, dropping the credentials and returning the transcript.
    pub fn close(self) -> Transcript {
        let elapsed = Utc::now() - self.opened_at;
        info!(
            session_id = %self.id,
            turns = self.transcript.len(),
            duration_secs = elapsed.num_seconds(),
            "session closed"
        );
        self.transcript
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
