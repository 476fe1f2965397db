//! The tailing engine task and its handle
//!
//! Each engine is a single tokio task that owns the poller, buffer, breaker,
//! live controller and projector. Hosts drive it through an
//! [`EngineHandle`], which sends commands over an unbounded channel and
//! observes an [`EngineStatus`] published on a `watch` channel after every
//! state change.
//!
//! ## Scheduling
//!
//! - The first poll is issued immediately after spawn (if live).
//! - The next poll is due `poll_interval` after the previous one completes.
//! - Nothing is scheduled while paused or while the breaker is open.
//! - A manual refresh polls immediately unless a poll is already in flight,
//!   in which case it is dropped.
//!
//! ## Teardown
//!
//! [`EngineHandle::shutdown`] cancels the engine's token. An outstanding
//! fetch is dropped and its result never reaches the buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use tailscope_core::{
    AuthToken, ConfigError, Cursor, EngineError, Event, FetchOutcome, FetchTransport,
};

use crate::buffer::EventBuffer;
use crate::circuit::{CircuitBreaker, CircuitState, TripReason};
use crate::config::{ControlFlags, EngineConfig, validate_capacity, validate_poll_interval};
use crate::filter::{EventPredicate, FilterExpression, compile};
use crate::live::LiveController;
use crate::poller::{CursorPoller, PollerPhase};
use crate::state::{
    ActiveView, FILTER_KEY, KeyValueStore, PanelState, PanelStatus, VIEW_KEY, save_json,
};
use crate::window::{Projection, RowMode, Viewport, WindowProjector};

/// Callbacks invoked on the engine task after each poll
///
/// Implementations must not block; they run between polls.
pub trait TailObserver: Send + Sync + 'static {
    /// Events newly inserted by a successful poll, oldest first
    ///
    /// Called once per successful poll, possibly with an empty slice.
    fn on_batch(&self, _events: &[Event]) {}

    /// A poll failed
    fn on_fetch_error(&self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TailObserver for NoopObserver {}

/// Snapshot of engine state for hosts
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub phase: PollerPhase,
    pub circuit: CircuitState,
    pub trip_reason: Option<TripReason>,
    pub live: bool,
    /// Events that landed while paused
    pub unseen: usize,
    pub buffered: usize,
    pub capacity: usize,
    /// Events passing the current filter and view
    pub matching: usize,
    pub cursor: Option<Cursor>,
    pub poll_interval: Duration,
    pub viewport: Viewport,
    pub panel: PanelState,
    pub status: PanelStatus,
    pub controls: ControlFlags,
    /// Completed polls, successful or not
    pub polls: u64,
}

#[derive(Debug)]
enum Command {
    Refresh,
    SetLive(bool),
    RetryConnection,
    SetFilter(FilterExpression),
    SetActiveView(ActiveView),
    SetRowMode(RowMode),
    SetSidebarCollapsed(bool),
    SetPollInterval(Duration),
    SetMaxStoredLogs(usize),
    ScrollTo(usize),
    ScrollPixels { scroll_px: u32, height_px: u32 },
    SetViewport(Viewport),
    Clear,
    Project(oneshot::Sender<Projection>),
    Shutdown,
}

/// What the loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    PollNow,
    Stop,
}

/// Entry point for building engines
pub struct TailEngine;

impl TailEngine {
    pub fn builder<T>(transport: Arc<T>) -> EngineBuilder<T>
    where
        T: FetchTransport + 'static,
    {
        EngineBuilder::new(transport)
    }
}

/// Builder for a tailing engine
pub struct EngineBuilder<T> {
    transport: Arc<T>,
    auth_token: Option<AuthToken>,
    config: EngineConfig,
    panel: Option<PanelState>,
    store: Option<Arc<dyn KeyValueStore>>,
    observer: Arc<dyn TailObserver>,
    viewport: Viewport,
}

impl<T> EngineBuilder<T>
where
    T: FetchTransport + 'static,
{
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            auth_token: None,
            config: EngineConfig::default(),
            panel: None,
            store: None,
            observer: Arc::new(NoopObserver),
            viewport: Viewport::default(),
        }
    }

    pub fn auth_token(mut self, token: AuthToken) -> Self {
        self.auth_token = Some(token);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial panel state; defaults to the config's initial filter
    pub fn panel_state(mut self, panel: PanelState) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Store used to restore and persist the filter and active view
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TailObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Validate the configuration and start the engine task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Result<(EngineHandle, JoinHandle<()>), ConfigError> {
        self.config.validate()?;
        let auth_token = match self.auth_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(ConfigError::MissingToken),
        };

        let buffer = EventBuffer::new(self.config.max_stored_logs)?;
        let circuit = CircuitBreaker::new(self.config.failure_threshold)?;

        let mut panel = self.panel.unwrap_or_else(|| PanelState {
            filter: self.config.initial_filter.clone(),
            ..Default::default()
        });
        if let Some(store) = &self.store {
            panel = panel.restored_from(store.as_ref());
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mut task = EngineTask {
            poller: CursorPoller::new(self.transport, auth_token),
            buffer,
            circuit,
            live: LiveController::new(self.config.start_live),
            projector: WindowProjector::new(self.viewport),
            predicate: EventPredicate::accept_all(),
            panel,
            poll_interval: self.config.poll_interval,
            controls: self.config.controls(),
            store: self.store,
            observer: self.observer,
            commands: command_rx,
            status_tx: None,
            cancel: cancel.clone(),
            has_polled: false,
            polls: 0,
            last_completed: None,
        };
        task.recompile();

        let (status_tx, status_rx) = watch::channel(task.snapshot());
        task.status_tx = Some(status_tx);

        let span = info_span!(
            "engine",
            source = %self.config.source_label,
            instance = %Uuid::new_v4()
        );
        let join = tokio::spawn(task.run().instrument(span));

        let handle = EngineHandle {
            commands: command_tx,
            status: status_rx,
            cancel,
        };
        Ok((handle, join))
    }
}

/// Cloneable handle for controlling a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<EngineStatus>,
    cancel: CancellationToken,
}

impl EngineHandle {
    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands.send(command).map_err(|_| EngineError::Stopped)
    }

    /// Poll now (ignored while a poll is in flight or polling is disabled)
    pub fn refresh(&self) -> Result<(), EngineError> {
        self.send(Command::Refresh)
    }

    pub fn set_live(&self, live: bool) -> Result<(), EngineError> {
        self.send(Command::SetLive(live))
    }

    /// Close the breaker and poll immediately
    pub fn retry_connection(&self) -> Result<(), EngineError> {
        self.send(Command::RetryConnection)
    }

    pub fn set_filter(&self, filter: FilterExpression) -> Result<(), EngineError> {
        self.send(Command::SetFilter(filter))
    }

    pub fn set_active_view(&self, view: ActiveView) -> Result<(), EngineError> {
        self.send(Command::SetActiveView(view))
    }

    pub fn set_row_mode(&self, mode: RowMode) -> Result<(), EngineError> {
        self.send(Command::SetRowMode(mode))
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) -> Result<(), EngineError> {
        self.send(Command::SetSidebarCollapsed(collapsed))
    }

    /// Takes effect from the next scheduled poll
    pub fn set_poll_interval(&self, interval: Duration) -> Result<(), EngineError> {
        validate_poll_interval(interval)?;
        self.send(Command::SetPollInterval(interval))
    }

    /// Shrinking evicts the oldest events immediately
    pub fn set_max_stored_logs(&self, capacity: usize) -> Result<(), EngineError> {
        validate_capacity(capacity)?;
        self.send(Command::SetMaxStoredLogs(capacity))
    }

    pub fn scroll_to(&self, offset: usize) -> Result<(), EngineError> {
        self.send(Command::ScrollTo(offset))
    }

    /// Set the viewport from pixel geometry using the current row mode
    pub fn scroll_pixels(&self, scroll_px: u32, height_px: u32) -> Result<(), EngineError> {
        self.send(Command::ScrollPixels {
            scroll_px,
            height_px,
        })
    }

    pub fn set_viewport(&self, viewport: Viewport) -> Result<(), EngineError> {
        self.send(Command::SetViewport(viewport))
    }

    /// Drop every buffered event
    pub fn clear(&self) -> Result<(), EngineError> {
        self.send(Command::Clear)
    }

    /// Rows currently visible in the viewport
    pub async fn project(&self) -> Result<Projection, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Project(tx))?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Latest published status
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Stop the engine, abandoning any in-flight poll
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

struct EngineTask<T> {
    poller: CursorPoller<T>,
    buffer: EventBuffer,
    circuit: CircuitBreaker,
    live: LiveController,
    projector: WindowProjector,
    predicate: EventPredicate,
    panel: PanelState,
    poll_interval: Duration,
    controls: ControlFlags,
    store: Option<Arc<dyn KeyValueStore>>,
    observer: Arc<dyn TailObserver>,
    commands: mpsc::UnboundedReceiver<Command>,
    status_tx: Option<watch::Sender<EngineStatus>>,
    cancel: CancellationToken,
    has_polled: bool,
    polls: u64,
    /// When the latest fetch settled; the next poll is due one interval later
    last_completed: Option<Instant>,
}

impl<T> EngineTask<T>
where
    T: FetchTransport + 'static,
{
    async fn run(mut self) {
        info!(
            interval = ?self.poll_interval,
            capacity = self.buffer.capacity(),
            live = self.live.is_live(),
            "Engine started"
        );

        let started = Instant::now();

        loop {
            let scheduled = self.live.is_live() && !self.circuit.is_disabled();
            let next_due = self
                .last_completed
                .map_or(started, |at| at + self.poll_interval);

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    match self.handle_command(command) {
                        Flow::Continue => {}
                        Flow::Stop => break,
                        Flow::PollNow => {
                            if !self.run_poll().await {
                                break;
                            }
                        }
                    }
                }

                _ = sleep_until(next_due), if scheduled => {
                    if !self.run_poll().await {
                        break;
                    }
                }
            }
        }

        self.poller.abandon();
        self.commands.close();
        self.publish();
        info!(polls = self.polls, buffered = self.buffer.len(), "Engine stopped");
    }

    /// Run one poll to completion while still serving commands
    ///
    /// Returns false if the engine was shut down meanwhile.
    async fn run_poll(&mut self) -> bool {
        let Some(mut fetch) = self.poller.begin(self.cancel.child_token()) else {
            return true;
        };
        self.publish();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    self.poller.abandon();
                    return false;
                }

                result = &mut fetch => {
                    self.last_completed = Some(Instant::now());
                    let outcome = self.poller.complete(result);
                    self.apply_outcome(outcome);
                    return true;
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        self.poller.abandon();
                        return false;
                    };
                    match self.handle_command(command) {
                        Flow::Continue => {}
                        Flow::PollNow => debug!("Poll already in flight, ignoring"),
                        Flow::Stop => {
                            self.poller.abandon();
                            return false;
                        }
                    }
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome) {
        self.polls += 1;

        match outcome {
            FetchOutcome::Success {
                events,
                next_cursor,
            } => {
                self.has_polled = true;
                self.circuit.record_success();

                let fetched = events.len();
                let report = self.buffer.merge(events);
                let fresh = self.buffer.latest_in_arrival_order(report.inserted);

                if report.inserted > 0 {
                    if self.live.take_scroll_reset() {
                        self.projector.scroll_to(0);
                    }
                    self.live.note_landed(report.inserted);
                }

                debug!(
                    cursor = %next_cursor,
                    fetched,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    evicted = report.evicted,
                    buffered = self.buffer.len(),
                    "Poll succeeded"
                );
                self.publish();
                self.observer.on_batch(&fresh);
            }
            FetchOutcome::Failure { kind, message } => {
                let was_disabled = self.circuit.is_disabled();
                let state = self.circuit.record_failure(kind);

                if state.disabled && !was_disabled {
                    warn!(
                        kind = %kind,
                        failures = state.consecutive_failures,
                        reason = ?self.circuit.trip_reason(),
                        error = %message,
                        "Polling disabled"
                    );
                } else {
                    debug!(
                        kind = %kind,
                        failures = state.consecutive_failures,
                        error = %message,
                        "Poll failed"
                    );
                }
                self.publish();
                self.observer.on_fetch_error(&message);
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> Flow {
        let flow = match command {
            Command::Refresh => {
                if self.circuit.is_disabled() {
                    debug!("Refresh ignored while polling is disabled");
                    return Flow::Continue;
                }
                Flow::PollNow
            }
            Command::SetLive(live) => {
                if self.live.set_live(live) {
                    info!(live, "Live state changed");
                }
                Flow::Continue
            }
            Command::RetryConnection => {
                info!(previous = ?self.circuit.trip_reason(), "Retrying connection");
                self.circuit.reset();
                Flow::PollNow
            }
            Command::SetFilter(filter) => {
                self.panel.filter = filter;
                self.recompile();
                self.projector.scroll_to(0);
                if let Some(store) = &self.store {
                    save_json(store.as_ref(), FILTER_KEY, &self.panel.filter);
                }
                Flow::Continue
            }
            Command::SetActiveView(view) => {
                self.panel.active_view = view;
                self.recompile();
                self.projector.scroll_to(0);
                if let Some(store) = &self.store {
                    save_json(store.as_ref(), VIEW_KEY, &self.panel.active_view);
                }
                Flow::Continue
            }
            Command::SetRowMode(mode) => {
                self.panel.row_mode = mode;
                Flow::Continue
            }
            Command::SetSidebarCollapsed(collapsed) => {
                self.panel.sidebar_collapsed = collapsed;
                Flow::Continue
            }
            Command::SetPollInterval(interval) => {
                debug!(interval = ?interval, "Poll interval changed");
                self.poll_interval = interval;
                Flow::Continue
            }
            Command::SetMaxStoredLogs(capacity) => {
                match self.buffer.set_capacity(capacity) {
                    Ok(evicted) => debug!(capacity, evicted, "Buffer capacity changed"),
                    Err(e) => warn!(error = %e, "Rejected buffer capacity"),
                }
                Flow::Continue
            }
            Command::ScrollTo(offset) => {
                self.projector.scroll_to(offset);
                Flow::Continue
            }
            Command::ScrollPixels {
                scroll_px,
                height_px,
            } => {
                self.projector.set_viewport(Viewport::from_scroll(
                    scroll_px,
                    height_px,
                    self.panel.row_mode,
                ));
                Flow::Continue
            }
            Command::SetViewport(viewport) => {
                self.projector.set_viewport(viewport);
                Flow::Continue
            }
            Command::Clear => {
                self.buffer.clear();
                self.projector.scroll_to(0);
                Flow::Continue
            }
            Command::Project(reply) => {
                let _ = reply.send(self.projector.project(&self.buffer, &self.predicate));
                return Flow::Continue;
            }
            Command::Shutdown => return Flow::Stop,
        };

        self.publish();
        flow
    }

    fn recompile(&mut self) {
        self.predicate = compile(&self.panel.filter).and(self.panel.active_view.predicate());
    }

    fn snapshot(&self) -> EngineStatus {
        let matching = crate::window::count_matching(&self.buffer, &self.predicate);
        EngineStatus {
            phase: self.poller.phase(),
            circuit: self.circuit.state(),
            trip_reason: self.circuit.trip_reason(),
            live: self.live.is_live(),
            unseen: self.live.unseen(),
            buffered: self.buffer.len(),
            capacity: self.buffer.capacity(),
            matching,
            cursor: self.poller.cursor().cloned(),
            poll_interval: self.poll_interval,
            viewport: self.projector.viewport(),
            panel: self.panel.clone(),
            status: PanelStatus::derive(self.has_polled, matching, self.circuit.trip_reason()),
            controls: self.controls,
            polls: self.polls,
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.status_tx {
            tx.send_replace(self.snapshot());
        }
    }
}
