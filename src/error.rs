//! Error types for the relay.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Responder error: {0}")]
    Responder(#[from] ResponderError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Configuration errors. Fatal: the process must not enter the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Message-source errors. Tick-scoped: logged, tick skipped, loop continues.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open message store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Message store query failed: {0}")]
    Query(String),

    #[error("Malformed row in message store: {0}")]
    BadRow(String),
}

/// Responder-service errors. Message-scoped: fallback reply, loop continues.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("Responder request failed: {0}")]
    Request(String),

    #[error("Responder returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from responder: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ResponderError {
    fn from(e: reqwest::Error) -> Self {
        ResponderError::Request(e.to_string())
    }
}

/// Message-sink errors. Message-scoped: logged, nothing further to send.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to invoke message channel: {0}")]
    Spawn(String),

    #[error("Message channel exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
