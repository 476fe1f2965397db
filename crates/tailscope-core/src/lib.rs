//! # Tailscope Core
//!
//! Core types, traits, and errors for the Tailscope live event tailing stack.
//!
//! This crate holds everything the tailing engine and its transports agree
//! on, so that the same engine logic runs against a real HTTP deployment and
//! against a scripted in-memory source in tests.
//!
//! ## Key Types
//!
//! - [`Event`]: One observed occurrence (function log line or network call)
//! - [`IdentityKey`]: Stable deduplication key, see [`identity_of`]
//! - [`Cursor`]: Opaque server-issued fetch progress token
//! - [`FetchOutcome`]: Tagged result of one poll attempt
//!
//! ## Key Traits
//!
//! - [`FetchTransport`]: Abstraction over the backend the events come from

pub mod cursor;
pub mod error;
pub mod event;
pub mod identity;
pub mod mock_transport;
pub mod transport;

// Re-export main types
pub use cursor::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use mock_transport::*;
pub use transport::*;
