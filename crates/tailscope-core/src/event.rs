//! Event types observed on a deployment
//!
//! An [`Event`] is one immutable occurrence streamed from the backend: a
//! function invocation outcome, a console line emitted by a function, or an
//! outgoing network call. The free-form detail of each occurrence lives in
//! [`EventPayload`], a union over the shapes we know with a generic fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an observed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Query,
    Mutation,
    Action,
    HttpAction,
    Console,
    Network,
}

impl EventCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            EventCategory::Query => "query",
            EventCategory::Mutation => "mutation",
            EventCategory::Action => "action",
            EventCategory::HttpAction => "http_action",
            EventCategory::Console => "console",
            EventCategory::Network => "network",
        }
    }

    pub fn all() -> &'static [EventCategory] {
        &[
            EventCategory::Query,
            EventCategory::Mutation,
            EventCategory::Action,
            EventCategory::HttpAction,
            EventCategory::Console,
            EventCategory::Network,
        ]
    }

    /// True for categories that record a function invocation
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            EventCategory::Query
                | EventCategory::Mutation
                | EventCategory::Action
                | EventCategory::HttpAction
        )
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        EventCategory::all()
            .iter()
            .copied()
            .find(|c| c.display_name() == lowered)
            .ok_or_else(|| format!("unknown event category: {}", s))
    }
}

/// Outcome status of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Error,
    #[default]
    Unknown,
}

/// Detail of a function invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Function path, e.g. `messages:list`
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
}

/// A console line emitted from inside a function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    Info,
    Log,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn badge(&self) -> &'static str {
        match self {
            ConsoleLevel::Debug => "DBG",
            ConsoleLevel::Info => "INF",
            ConsoleLevel::Log => "LOG",
            ConsoleLevel::Warn => "WRN",
            ConsoleLevel::Error => "ERR",
        }
    }
}

/// An outgoing network call made by the deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCall {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured detail of an event
///
/// Decoding tries the known shapes most-specific first and falls back to
/// [`EventPayload::Generic`] so an unrecognised payload never fails a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Network(NetworkCall),
    Console(ConsoleLine),
    Function(FunctionCall),
    Generic(serde_json::Value),
}

impl Default for EventPayload {
    fn default() -> Self {
        EventPayload::Generic(serde_json::Value::Null)
    }
}

impl EventPayload {
    /// Function path, or the URL of a network call
    pub fn path(&self) -> Option<&str> {
        match self {
            EventPayload::Network(call) => Some(call.url.as_str()),
            EventPayload::Function(call) => Some(call.path.as_str()),
            EventPayload::Console(line) => line.path.as_deref(),
            EventPayload::Generic(value) => value.get("path").and_then(|v| v.as_str()),
        }
    }

    /// Human readable message carried by the payload
    pub fn message(&self) -> Option<&str> {
        match self {
            EventPayload::Network(_) => None,
            EventPayload::Function(call) => call.message.as_deref(),
            EventPayload::Console(line) => Some(line.message.as_str()),
            EventPayload::Generic(value) => value.get("message").and_then(|v| v.as_str()),
        }
    }

    /// Error text, if the occurrence failed
    pub fn error_text(&self) -> Option<&str> {
        match self {
            EventPayload::Network(call) => call.error.as_deref(),
            EventPayload::Function(call) => call.error.as_deref(),
            EventPayload::Console(_) => None,
            EventPayload::Generic(value) => value.get("error").and_then(|v| v.as_str()),
        }
    }
}

/// One observed occurrence on the deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub category: EventCategory,
    /// Groups events produced by one logical request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: i64, category: EventCategory, payload: EventPayload) -> Self {
        Self {
            timestamp,
            category,
            correlation_id: None,
            status: EventStatus::Unknown,
            payload,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Fields searched by free-text filters, in match order:
    /// path, message, correlation id, error text.
    pub fn searchable_fields(&self) -> [Option<&str>; 4] {
        [
            self.payload.path(),
            self.payload.message(),
            self.correlation_id.as_deref(),
            self.payload.error_text(),
        ]
    }

    pub fn is_success(&self) -> bool {
        self.status == EventStatus::Success
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// One-line description for log panels
    pub fn summary(&self) -> String {
        match &self.payload {
            EventPayload::Function(call) => match (&call.error, &call.message) {
                (Some(err), _) => format!("{} failed: {}", call.path, err),
                (None, Some(msg)) => format!("{}: {}", call.path, msg),
                (None, None) => match call.execution_time_ms {
                    Some(ms) => format!("{} ({:.0}ms)", call.path, ms),
                    None => call.path.clone(),
                },
            },
            EventPayload::Console(line) => {
                let preview: String = line.message.chars().take(120).collect();
                format!("[{}] {}", line.level.badge(), preview)
            }
            EventPayload::Network(call) => {
                let status = call
                    .status_code
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "---".to_string());
                format!("{} {} {}", call.method, call.url, status)
            }
            EventPayload::Generic(value) => value.to_string().chars().take(120).collect(),
        }
    }
}
