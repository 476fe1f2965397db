//! Error types for Tailscope

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for Tailscope
#[derive(Debug, Error)]
pub enum TailError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Coarse classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Transport unreachable, timed out, or aborted
    Network,
    /// Credentials rejected by the deployment
    Auth,
    /// Response body could not be decoded
    Parse,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Network => write!(f, "network"),
            FetchErrorKind::Auth => write!(f, "auth"),
            FetchErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Errors surfaced by a [`FetchTransport`](crate::FetchTransport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authorization rejected: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// The kind of failure, as seen by the circuit breaker
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Auth(_) => FetchErrorKind::Auth,
            FetchError::Parse(_) => FetchErrorKind::Parse,
        }
    }

    /// A request abandoned through its cancellation signal
    pub fn aborted() -> Self {
        FetchError::Network("request aborted".into())
    }
}

/// Invalid settings supplied by the embedding host
///
/// These are fatal at construction time; an engine is never started with
/// a configuration that fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_stored_logs must be greater than zero")]
    ZeroCapacity,

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("failure threshold must be greater than zero")]
    ZeroThreshold,

    #[error("Invalid deployment URL: {0}")]
    InvalidUrl(String),

    #[error("No authorization token supplied")]
    MissingToken,

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Errors from talking to a running engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Engine has been shut down")]
    Stopped,

    #[error("Engine rejected setting: {0}")]
    Rejected(#[from] ConfigError),
}

/// Result type alias for Tailscope operations
pub type TailResult<T> = Result<T, TailError>;
