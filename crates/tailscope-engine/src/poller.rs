//! Cursor-threaded fetching
//!
//! The poller owns the cursor and performs one fetch at a time. A fetch is
//! split into [`begin`](CursorPoller::begin), which hands out an owned
//! future, and [`complete`](CursorPoller::complete), which applies its
//! result. The split lets the engine keep handling commands while a fetch
//! is outstanding, and lets teardown drop the future without ever
//! applying it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tailscope_core::{AuthToken, Cursor, FetchBatch, FetchError, FetchOutcome, FetchRequest, FetchTransport};

/// An outstanding fetch
pub type InFlight = Pin<Box<dyn Future<Output = Result<FetchBatch, FetchError>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerPhase {
    #[default]
    Idle,
    Fetching,
    /// Last fetch failed
    Backoff,
}

pub struct CursorPoller<T> {
    transport: Arc<T>,
    auth_token: AuthToken,
    cursor: Option<Cursor>,
    phase: PollerPhase,
}

impl<T> CursorPoller<T>
where
    T: FetchTransport + 'static,
{
    pub fn new(transport: Arc<T>, auth_token: AuthToken) -> Self {
        Self {
            transport,
            auth_token,
            cursor: None,
            phase: PollerPhase::Idle,
        }
    }

    /// Start a fetch with the current cursor
    ///
    /// Returns `None` when a fetch is already in flight.
    pub fn begin(&mut self, cancel: CancellationToken) -> Option<InFlight> {
        if self.phase == PollerPhase::Fetching {
            return None;
        }
        self.phase = PollerPhase::Fetching;

        let transport = Arc::clone(&self.transport);
        let token = self.auth_token.clone();
        let cursor = self.cursor.clone();
        debug!(cursor = ?cursor, "Starting fetch");

        Some(Box::pin(async move {
            let request = FetchRequest {
                cursor: cursor.as_ref(),
                auth_token: &token,
            };
            transport.fetch_batch(request, cancel).await
        }))
    }

    /// Apply the result of the fetch started by [`begin`](Self::begin)
    ///
    /// The cursor only advances on success. A response that echoes the
    /// current cursor carries nothing new and is reported as an empty batch.
    pub fn complete(&mut self, result: Result<FetchBatch, FetchError>) -> FetchOutcome {
        match result {
            Ok(batch) => {
                self.phase = PollerPhase::Idle;
                if self.cursor.as_ref() == Some(&batch.next_cursor) {
                    debug!(
                        cursor = %batch.next_cursor,
                        dropped = batch.events.len(),
                        "Cursor did not advance"
                    );
                    return FetchOutcome::Success {
                        events: Vec::new(),
                        next_cursor: batch.next_cursor,
                    };
                }
                self.cursor = Some(batch.next_cursor.clone());
                FetchOutcome::Success {
                    events: batch.events,
                    next_cursor: batch.next_cursor,
                }
            }
            Err(e) => {
                self.phase = PollerPhase::Backoff;
                Err::<FetchBatch, _>(e).into()
            }
        }
    }

    /// Forget an in-flight fetch without applying its result
    pub fn abandon(&mut self) {
        if self.phase == PollerPhase::Fetching {
            debug!("Abandoning in-flight fetch");
            self.phase = PollerPhase::Idle;
        }
    }

    /// Begin and complete one fetch
    ///
    /// Returns `None` when a fetch is already in flight.
    pub async fn poll(&mut self, cancel: CancellationToken) -> Option<FetchOutcome> {
        let fetch = self.begin(cancel)?;
        let result = fetch.await;
        Some(self.complete(result))
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn phase(&self) -> PollerPhase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == PollerPhase::Fetching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tailscope_core::{Event, EventCategory, EventPayload, FetchErrorKind, ScriptedTransport};

    fn event(ts: i64) -> Event {
        Event::new(ts, EventCategory::Network, EventPayload::default())
    }

    fn poller(transport: ScriptedTransport) -> (CursorPoller<ScriptedTransport>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (CursorPoller::new(Arc::clone(&transport), AuthToken::new("secret")), transport)
    }

    #[tokio::test]
    async fn test_success_advances_cursor() {
        let (mut poller, transport) = poller(
            ScriptedTransport::new()
                .respond(vec![event(1), event(2)], "a")
                .respond(vec![event(3)], "b"),
        );

        let outcome = poller.poll(CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Success { ref events, .. } if events.len() == 2));
        assert_eq!(poller.cursor(), Some(&Cursor::from("a")));
        assert_eq!(poller.phase(), PollerPhase::Idle);

        poller.poll(CancellationToken::new()).await.unwrap();
        assert_eq!(poller.cursor(), Some(&Cursor::from("b")));
        assert_eq!(transport.seen_cursors(), vec![None, Some(Cursor::from("a"))]);
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor() {
        let (mut poller, transport) = poller(
            ScriptedTransport::new()
                .respond(vec![event(1)], 7)
                .fail(FetchError::Network("reset".into())),
        );

        poller.poll(CancellationToken::new()).await.unwrap();
        let outcome = poller.poll(CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(FetchErrorKind::Network));
        assert_eq!(poller.cursor(), Some(&Cursor::from(7)));
        assert_eq!(poller.phase(), PollerPhase::Backoff);

        // The retry reuses the unadvanced cursor
        poller.poll(CancellationToken::new()).await.unwrap();
        assert_eq!(transport.seen_cursors().last(), Some(&Some(Cursor::from(7))));
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_empty_success() {
        let (mut poller, _) = poller(
            ScriptedTransport::new()
                .respond(vec![event(1)], "a")
                .respond(vec![event(1), event(2)], "a"),
        );

        poller.poll(CancellationToken::new()).await.unwrap();
        let outcome = poller.poll(CancellationToken::new()).await.unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Success {
                events: vec![],
                next_cursor: Cursor::from("a")
            }
        );
    }

    #[tokio::test]
    async fn test_only_one_fetch_in_flight() {
        let (mut poller, transport) = poller(ScriptedTransport::new().hang());
        let cancel = CancellationToken::new();

        let fetch = poller.begin(cancel.clone()).unwrap();
        assert!(poller.is_in_flight());
        assert!(poller.begin(cancel.clone()).is_none());
        assert!(poller.poll(cancel.clone()).await.is_none());

        cancel.cancel();
        let result = fetch.await;
        assert_eq!(result, Err(FetchError::aborted()));
        poller.abandon();
        assert_eq!(poller.phase(), PollerPhase::Idle);
        assert_eq!(poller.cursor(), None);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_is_never_applied() {
        let (mut poller, _) = poller(
            ScriptedTransport::new().respond_after(Duration::from_millis(500), vec![event(1)], "late"),
        );

        let fetch = poller.begin(CancellationToken::new()).unwrap();
        drop(fetch);
        poller.abandon();
        assert_eq!(poller.cursor(), None);
    }
}
