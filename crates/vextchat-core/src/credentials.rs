// Credential bundle and the two ways of sourcing it (interactive form or
// secret store + environment overrides).

use std::fmt;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SecretsConfig;

/// Environment variables that override the secret store file.
pub const ENV_API_KEY: &str = "VEXT_API_KEY";
pub const ENV_CHANNEL_TOKEN: &str = "CHANNEL_TOKEN";
pub const ENV_ENDPOINT_ID: &str = "ENDPOINT_ID";

// ---------------------------------------------------------------------------
// CredentialBundle
// ---------------------------------------------------------------------------

/// The three values needed to authenticate against and address a hook.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub api_key: String,
    pub channel_token: String,
    pub endpoint_id: String,
}

impl CredentialBundle {
    pub fn new(
        api_key: impl Into<String>,
        channel_token: impl Into<String>,
        endpoint_id: impl Into<String>,
    ) -> Self {
        CredentialBundle {
            api_key: api_key.into(),
            channel_token: channel_token.into(),
            endpoint_id: endpoint_id.into(),
        }
    }

    /// Names of the fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("api_key", &self.api_key),
            ("channel_token", &self.channel_token),
            ("endpoint_id", &self.endpoint_id),
        ];
        fields
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect()
    }

    /// True when every field is non-empty.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Presence flags for display. Never carries the secret values.
    pub fn summary(&self, source: CredentialSource) -> CredentialSummary {
        CredentialSummary {
            source,
            api_key_set: !self.api_key.is_empty(),
            channel_token_set: !self.channel_token.is_empty(),
            endpoint_id_set: !self.endpoint_id.is_empty(),
        }
    }
}

// The API key must never end up in logs.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<empty>"
        } else {
            "<redacted>"
        };
        f.debug_struct("CredentialBundle")
            .field("api_key", &api_key)
            .field("channel_token", &self.channel_token)
            .field("endpoint_id", &self.endpoint_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CredentialSource
// ---------------------------------------------------------------------------

/// Where the session gets its credentials from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Typed into the credential form at runtime.
    Interactive,
    /// Read from `credentials.toml` and the environment at startup.
    SecretStore,
}

impl CredentialSource {
    pub fn label(self) -> &'static str {
        match self {
            CredentialSource::Interactive => "interactive",
            CredentialSource::SecretStore => "secret store",
        }
    }
}

/// Which credential fields are filled in, for the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialSummary {
    pub source: CredentialSource,
    pub api_key_set: bool,
    pub channel_token_set: bool,
    pub endpoint_id_set: bool,
}

impl CredentialSummary {
    pub fn is_complete(&self) -> bool {
        self.api_key_set && self.channel_token_set && self.endpoint_id_set
    }
}

// ---------------------------------------------------------------------------
// Secret store resolution
// ---------------------------------------------------------------------------

/// Resolve a bundle from the secret store file, letting non-empty environment
/// values win over the file. When the channel token is still empty and
/// `generate_channel_token` is set, a random session identifier is used.
///
/// `env` is injected so tests don't have to touch the process environment.
pub fn resolve_secret_store<F>(
    secrets: &SecretsConfig,
    generate_channel_token: bool,
    env: F,
) -> CredentialBundle
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |var: &str, file_value: &Option<String>| -> String {
        match env(var).filter(|v| !v.is_empty()) {
            Some(value) => {
                debug!("credential {var} taken from environment");
                value
            }
            None => file_value.clone().unwrap_or_default(),
        }
    };

    let mut bundle = CredentialBundle {
        api_key: pick(ENV_API_KEY, &secrets.api_key),
        channel_token: pick(ENV_CHANNEL_TOKEN, &secrets.channel_token),
        endpoint_id: pick(ENV_ENDPOINT_ID, &secrets.endpoint_id),
    };

    if bundle.channel_token.is_empty() && generate_channel_token {
        bundle.channel_token = generate_session_token();
        info!("generated channel token for this session");
    }

    bundle
}

/// Convenience wrapper reading overrides from the process environment.
pub fn resolve_secret_store_from_env(
    secrets: &SecretsConfig,
    generate_channel_token: bool,
) -> CredentialBundle {
    resolve_secret_store(secrets, generate_channel_token, |var| std::env::var(var).ok())
}

/// A fresh random session identifier usable as a channel token.
pub fn generate_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
