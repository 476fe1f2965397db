//! Transport abstraction for fetching event batches
//!
//! A [`FetchTransport`] performs exactly one request/response exchange per
//! call. Timeouts, retries and HTTP details belong to the implementation;
//! the engine only sees a [`FetchBatch`] or a [`FetchError`].

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cursor::Cursor;
use crate::error::{FetchError, FetchErrorKind};
use crate::event::Event;

/// Bearer credential for the deployment
///
/// `Debug` is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Parameters of one fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// `None` on the very first fetch
    pub cursor: Option<&'a Cursor>,
    pub auth_token: &'a AuthToken,
}

/// A successful response
#[derive(Debug, Clone, PartialEq)]
pub struct FetchBatch {
    /// Events in the order the source delivered them (oldest first)
    pub events: Vec<Event>,
    pub next_cursor: Cursor,
}

/// Tagged result of one poll attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { events: Vec<Event>, next_cursor: Cursor },
    Failure { kind: FetchErrorKind, message: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FetchErrorKind> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<FetchBatch, FetchError>> for FetchOutcome {
    fn from(result: Result<FetchBatch, FetchError>) -> Self {
        match result {
            Ok(batch) => FetchOutcome::Success {
                events: batch.events,
                next_cursor: batch.next_cursor,
            },
            Err(e) => FetchOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// Source of event batches
///
/// Implementations must honour `cancel`: once it fires, the call should
/// return promptly with an aborted [`FetchError::Network`].
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch_batch(
        &self,
        request: FetchRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<FetchBatch, FetchError>;
}

#[async_trait]
impl<T: FetchTransport + ?Sized> FetchTransport for std::sync::Arc<T> {
    async fn fetch_batch(
        &self,
        request: FetchRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<FetchBatch, FetchError> {
        (**self).fetch_batch(request, cancel).await
    }
}
