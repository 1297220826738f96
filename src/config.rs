//! Relay configuration, read from the environment once at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default instructions sent with every responder request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a thoughtful AI coach helping people build better habits and live more intentionally.\n\nKeep responses concise (1-3 sentences usually) since this is a text conversation. Be warm but direct. Ask good questions. Don't be preachy.\n\nIf someone is just saying hi or starting a conversation, greet them warmly and ask what's on their mind.";

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Path to the Messages.app store (chat.db).
    pub db_path: PathBuf,
    /// Delay between poll ticks.
    pub poll_interval: Duration,
    /// How far behind now the fetch watermark sits.
    pub lookback: Duration,
    /// Maximum rows fetched per poll.
    pub fetch_limit: u32,
    /// Responder credential.
    pub api_key: SecretString,
    /// Responder model identifier.
    pub model: String,
    /// Maximum output length per responder call.
    pub max_tokens: u32,
    /// System prompt prepended to every responder request.
    pub system_prompt: String,
}

impl RelayConfig {
    /// Build a config from environment variables.
    ///
    /// `ANTHROPIC_API_KEY` is required; everything else has a default.
    /// Missing credentials fail here, before the poll loop ever starts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".into()))?;

        let db_path = std::env::var("IMESSAGE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let poll_interval_secs: u64 = env_parsed("IMESSAGE_POLL_INTERVAL_SECS", 2)?;
        let lookback_secs: u64 = env_parsed("IMESSAGE_LOOKBACK_SECS", 300)?;
        let fetch_limit: u32 = env_parsed("IMESSAGE_FETCH_LIMIT", 20)?;
        let max_tokens: u32 = env_parsed("IMESSAGE_MAX_TOKENS", 500)?;

        let model = std::env::var("IMESSAGE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        let system_prompt = std::env::var("IMESSAGE_SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(Self {
            db_path,
            poll_interval: Duration::from_secs(poll_interval_secs),
            lookback: Duration::from_secs(lookback_secs),
            fetch_limit,
            api_key: SecretString::from(api_key),
            model,
            max_tokens,
            system_prompt,
        })
    }
}

/// The standard Messages.app store location.
fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join("Library/Messages/chat.db")
}

/// Read an env var and parse it, falling back to `default` when unset.
/// A set-but-unparseable value is a hard error rather than a silent default.
fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
