//! # Tailscope Engine
//!
//! Live event tailing and windowing.
//!
//! The engine polls a [`FetchTransport`](tailscope_core::FetchTransport)
//! with a server-issued cursor, merges each batch into a bounded buffer
//! without duplicates, and projects only the visible window of the filtered
//! buffer for the host to render. Repeated failures open a circuit breaker
//! that stops polling until the host retries.
//!
//! ## Pipeline
//!
//! ```text
//! CursorPoller -> EventBuffer::merge -> EventPredicate -> WindowProjector -> host
//!       ^                                                        ^
//!  CircuitBreaker, LiveController                       LiveController (scroll reset)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tailscope_core::AuthToken;
//! use tailscope_engine::{EngineConfig, TailEngine};
//!
//! let (handle, join) = TailEngine::builder(Arc::new(transport))
//!     .auth_token(AuthToken::new(token))
//!     .config(EngineConfig::default())
//!     .spawn()?;
//!
//! let window = handle.project().await?;
//! handle.shutdown();
//! join.await?;
//! ```

pub mod buffer;
pub mod circuit;
pub mod config;
pub mod engine;
pub mod filter;
pub mod live;
pub mod poller;
pub mod state;
pub mod window;

pub use buffer::{EventBuffer, MergeReport};
pub use circuit::{CircuitBreaker, CircuitState, TripReason};
pub use config::{
    ControlFlags, DEFAULT_FAILURE_THRESHOLD, DEFAULT_MAX_STORED_LOGS, DEFAULT_POLL_INTERVAL,
    EngineConfig, Preset,
};
pub use engine::{EngineBuilder, EngineHandle, EngineStatus, NoopObserver, TailEngine, TailObserver};
pub use filter::{CategoryFilter, EventPredicate, FilterExpression, compile};
pub use live::LiveController;
pub use poller::{CursorPoller, InFlight, PollerPhase};
pub use state::{ActiveView, FILTER_KEY, KeyValueStore, MemoryStore, PanelState, PanelStatus, VIEW_KEY};
pub use window::{Projection, RowMode, Viewport, WindowProjector, count_matching, project};
