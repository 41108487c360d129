// Configuration loading and parsing (chat.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::credentials::CredentialSource;

/// Overrides the base directory that holds `config/` and `defaults/`.
pub const HOME_ENV: &str = "VEXTCHAT_HOME";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub relay: RelayConfig,
    pub credentials: CredentialsConfig,
    pub ui: UiConfig,
    pub secrets: SecretsConfig,
}

// ---------------------------------------------------------------------------
// chat.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire chat.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ChatFile {
    relay: RelayConfig,
    credentials: CredentialsConfig,
    #[serde(default)]
    ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Scheme and host of the hook service. Path segments are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Value of the `env` field in every request body.
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Reply fields tried in order before falling back to the whole body.
    #[serde(default = "default_reply_fields")]
    pub reply_fields: Vec<String>,
    /// Treat a 2xx JSON object carrying an `error` key as a failure.
    #[serde(default)]
    pub error_field_is_failure: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            base_url: default_base_url(),
            environment: default_environment(),
            timeout_secs: default_timeout_secs(),
            reply_fields: default_reply_fields(),
            error_field_is_failure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub source: CredentialSource,
    /// Generate a random channel token when the secret store has none.
    #[serde(default)]
    pub generate_channel_token: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            title: default_title(),
        }
    }
}

fn default_base_url() -> String {
    "https://payload.vextapp.com".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_reply_fields() -> Vec<String> {
    vec!["response".into(), "message".into(), "text".into()]
}

fn default_title() -> String {
    "VextApp Q&A Assistant".to_string()
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

/// Secret store contents. Every field is optional; environment variables can
/// fill the gaps at resolution time.
#[derive(Clone, Deserialize, Default)]
pub struct SecretsConfig {
    pub api_key: Option<String>,
    pub channel_token: Option<String>,
    pub endpoint_id: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("channel_token", &self.channel_token)
            .field("endpoint_id", &self.endpoint_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/chat.toml` and (optionally)
/// `config/credentials.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- chat.toml (required) ---
    let chat_path = config_dir.join("chat.toml");
    let chat_text = read_file(&chat_path)?;
    let chat_file: ChatFile = toml::from_str(&chat_text).map_err(|e| ConfigError::ParseError {
        path: chat_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let secrets_path = config_dir.join("credentials.toml");
    let secrets = if secrets_path.exists() {
        let text = read_file(&secrets_path)?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: secrets_path.clone(),
            source: e,
        })?
    } else {
        SecretsConfig::default()
    };

    let config = Config {
        relay: chat_file.relay,
        credentials: chat_file.credentials,
        ui: chat_file.ui,
        secrets,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/` on first run.
///
/// Only TOML files are seeded, and a file already in `config/` is never
/// replaced. The secret store ships as `credentials.toml.example` and is
/// left for the user to fill in. Returns the paths that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(seed_error(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the project root or set {HOME_ENV}",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| seed_error(format!("failed to create config directory: {e}")))?;
    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| seed_error(format!("failed to read defaults directory: {e}")))?;

    let mut copied = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| seed_error(format!("failed to read defaults entry: {e}")))?
            .path();
        let is_toml = source.extension().is_some_and(|ext| ext == "toml");
        let Some(file_name) = source.file_name() else {
            continue;
        };
        if !source.is_file() || !is_toml {
            continue;
        }

        let target = config_dir.join(file_name);
        if seed_file(&source, &target)? {
            debug!(file = %target.display(), "Seeded config file from defaults");
            copied.push(target);
        }
    }

    if !copied.is_empty() {
        info!(count = copied.len(), dir = %config_dir.display(), "Seeded first-run config");
    }
    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists. The existence
/// check and the create are one step (`create_new`).
fn seed_file(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(seed_error(format!("failed to create {}: {e}", target.display()))),
    };
    let content = std::fs::read(source)
        .map_err(|e| seed_error(format!("failed to read {}: {e}", source.display())))?;
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| seed_error(format!("failed to write {}: {e}", target.display())))?;
    Ok(true)
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// The directory holding `config/` and `defaults/`: `$VEXTCHAT_HOME` when set,
/// otherwise the current working directory.
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
            path: PathBuf::from("."),
        }),
    }
}

/// Convenience wrapper: loads config relative to `base_dir()`.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let base = base_dir()?;
    ensure_config_files(&base)?;
    load_config_from(&base)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let relay = &config.relay;

    match url::Url::parse(&relay.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() => {}
        Ok(url) => {
            return Err(ConfigError::ValidationError {
                field: "relay.base_url".into(),
                message: format!("must be an http(s) URL, got scheme `{}`", url.scheme()),
            });
        }
        Err(e) => {
            return Err(ConfigError::ValidationError {
                field: "relay.base_url".into(),
                message: format!("invalid URL `{}`: {e}", relay.base_url),
            });
        }
    }

    if relay.environment.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "relay.environment".into(),
            message: "must not be empty".into(),
        });
    }

    if relay.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "relay.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if let Some(idx) = relay.reply_fields.iter().position(|f| f.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: format!("relay.reply_fields[{idx}]"),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
