// Catch-hook relay client.
//
// Builds the hook URL from the credential bundle, POSTs the message once with
// a fixed timeout, and folds every outcome (missing credentials, transport
// fault, error status, odd body) into a `RelayResult`. Nothing here returns
// an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use vextchat_core::config::RelayConfig;
use vextchat_core::credentials::CredentialBundle;

use crate::reply::{render_truthy, ReplyPolicy};
use crate::result::{RelayError, RelayResult};
use crate::transport::{HttpTransport, OutboundRequest, Transport, TransportError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const API_KEY_HEADER: &str = "Apikey";
const API_KEY_PREFIX: &str = "Api-Key";

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Stateless relay. Cheap to share behind an `Arc`.
pub struct Relay {
    transport: Arc<dyn Transport>,
    base_url: reqwest::Url,
    environment: String,
    timeout: Duration,
    policy: ReplyPolicy,
    error_field_is_failure: bool,
}

impl Relay {
    /// Relay against `base_url` with default environment, timeout and reply
    /// policy.
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Result<Self, RelayError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Relay {
            transport,
            base_url,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            policy: ReplyPolicy::default(),
            error_field_is_failure: false,
        })
    }

    /// Build a relay from the `[relay]` config section using the reqwest
    /// transport.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::from_config_with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn from_config_with_transport(
        config: &RelayConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RelayError> {
        Ok(Self::new(transport, &config.base_url)?
            .with_environment(config.environment.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_policy(ReplyPolicy::from_fields(config.reply_fields.iter().cloned()))
            .with_error_field_is_failure(config.error_field_is_failure))
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: ReplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_error_field_is_failure(mut self, enabled: bool) -> Self {
        self.error_field_is_failure = enabled;
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `message` tagged with the configured environment.
    pub async fn send(&self, message: &str, credentials: &CredentialBundle) -> RelayResult {
        self.send_with_env(message, credentials, &self.environment).await
    }

    /// Send `message` tagged with `environment`. Always returns a result;
    /// failures are folded into `RelayResult::Failure`.
    pub async fn send_with_env(
        &self,
        message: &str,
        credentials: &CredentialBundle,
        environment: &str,
    ) -> RelayResult {
        let result = self.try_send(message, credentials, environment).await;
        match &result {
            Ok(_) => info!(endpoint_id = %credentials.endpoint_id, "relay call succeeded"),
            Err(RelayError::MissingCredentials { missing }) => {
                warn!(?missing, "credentials incomplete, request not sent");
            }
            Err(e) => warn!(endpoint_id = %credentials.endpoint_id, error = %e, "relay call failed"),
        }
        result.into()
    }

    async fn try_send(
        &self,
        message: &str,
        credentials: &CredentialBundle,
        environment: &str,
    ) -> Result<String, RelayError> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            return Err(RelayError::MissingCredentials { missing });
        }

        let request = self.build_request(message, credentials, environment)?;
        let url = request.url.to_string();
        debug!(endpoint_id = %credentials.endpoint_id, env = environment, "posting to hook");

        let response = self
            .transport
            .post_json(request)
            .await
            .map_err(|e| match e {
                TransportError::Timeout(after) => RelayError::Timeout(after),
                TransportError::Connect(msg) => RelayError::Connect(msg),
                TransportError::Other(msg) => RelayError::Transport(msg),
            })?;

        if !response.is_success() {
            return Err(RelayError::HttpStatus {
                status: response.status,
                reason: response.reason,
                url,
                body: Some(response.body).filter(|b| !b.is_empty()),
            });
        }

        let body: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "hook reply is not valid JSON, using raw text");
                return Ok(response.body.trim().to_string());
            }
        };

        if self.error_field_is_failure {
            if let Some(message) = body.get("error").and_then(render_truthy) {
                return Err(RelayError::ErrorField {
                    status: response.status,
                    message,
                });
            }
        }

        Ok(self.policy.extract(&body))
    }

    /// Build the outbound request for a message. Does not validate the
    /// credentials; `send` does that first.
    pub fn build_request(
        &self,
        message: &str,
        credentials: &CredentialBundle,
        environment: &str,
    ) -> Result<OutboundRequest, RelayError> {
        let url = hook_url(&self.base_url, &credentials.endpoint_id, &credentials.channel_token)?;

        let body = serde_json::json!({
            "payload": message,
            "env": environment,
        });

        Ok(OutboundRequest {
            url,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (
                    API_KEY_HEADER.to_string(),
                    format!("{API_KEY_PREFIX} {}", credentials.api_key),
                ),
            ],
            body,
            timeout: self.timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

fn parse_base_url(base_url: &str) -> Result<reqwest::Url, RelayError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| RelayError::InvalidUrl(format!("{base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(RelayError::InvalidUrl(base_url.to_string()));
    }
    Ok(url)
}

/// `{base}/hook/{endpoint_id}/catch/{channel_token}`, with each value
/// percent-encoded as a single path segment.
pub(crate) fn hook_url(
    base: &reqwest::Url,
    endpoint_id: &str,
    channel_token: &str,
) -> Result<reqwest::Url, RelayError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RelayError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["hook", endpoint_id, "catch", channel_token]);
    Ok(url)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
