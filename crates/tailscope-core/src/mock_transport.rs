//! Scripted transport implementation for testing
//!
//! Provides an in-memory [`FetchTransport`] whose responses are queued up
//! front, so poller and engine behaviour can be exercised deterministically
//! without a deployment.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tailscope_core::{Cursor, ScriptedTransport};
//!
//! let transport = ScriptedTransport::new()
//!     .respond(vec![event_a, event_b], Cursor::from("a"))
//!     .fail(FetchError::Network("reset".into()));
//!
//! // Each fetch pops the next scripted step.
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cursor::Cursor;
use crate::error::FetchError;
use crate::event::Event;
use crate::transport::{FetchBatch, FetchRequest, FetchTransport};

/// One scripted response
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Resolve immediately
    Reply(Result<FetchBatch, FetchError>),
    /// Resolve after a delay (uses tokio time, so paused clocks apply)
    Delayed(Duration, Result<FetchBatch, FetchError>),
    /// Never resolve; only cancellation ends the request
    Hang,
}

/// A transport that replays a fixed script
///
/// When the script runs out every fetch returns an empty batch that echoes
/// the request cursor, which the poller treats as "no progress".
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ScriptStep>>,
    seen_cursors: Mutex<Vec<Option<Cursor>>>,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful batch
    pub fn respond(self, events: Vec<Event>, next_cursor: impl Into<Cursor>) -> Self {
        self.push(ScriptStep::Reply(Ok(FetchBatch {
            events,
            next_cursor: next_cursor.into(),
        })));
        self
    }

    /// Queue a failure
    pub fn fail(self, error: FetchError) -> Self {
        self.push(ScriptStep::Reply(Err(error)));
        self
    }

    /// Queue a successful batch delivered after `delay`
    pub fn respond_after(
        self,
        delay: Duration,
        events: Vec<Event>,
        next_cursor: impl Into<Cursor>,
    ) -> Self {
        self.push(ScriptStep::Delayed(
            delay,
            Ok(FetchBatch {
                events,
                next_cursor: next_cursor.into(),
            }),
        ));
        self
    }

    /// Queue a request that never completes on its own
    pub fn hang(self) -> Self {
        self.push(ScriptStep::Hang);
        self
    }

    /// Append a step to a transport that is already shared
    pub fn push(&self, step: ScriptStep) {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
    }

    /// Number of fetches started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetches that ended through cancellation
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cursors sent with each fetch, in order
    pub fn seen_cursors(&self) -> Vec<Option<Cursor>> {
        self.seen_cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Steps not consumed yet
    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl FetchTransport for ScriptedTransport {
    async fn fetch_batch(
        &self,
        request: FetchRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<FetchBatch, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.cursor.cloned());

        let step = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let echo = || FetchBatch {
            events: Vec::new(),
            next_cursor: request.cursor.cloned().unwrap_or(Cursor::Numeric(0)),
        };

        let (delay, result) = match step {
            Some(ScriptStep::Reply(result)) => (None, result),
            Some(ScriptStep::Delayed(delay, result)) => (Some(delay), result),
            Some(ScriptStep::Hang) => {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(FetchError::aborted());
            }
            None => (None, Ok(echo())),
        };

        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    return Err(FetchError::aborted());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        result
    }
}
