//! # Tailscope Transport
//!
//! HTTP implementation of [`FetchTransport`](tailscope_core::FetchTransport).
//!
//! ## Wire contract
//!
//! - `GET {deployment_url}/api/stream_events?cursor=<cursor>`
//! - `Authorization: Bearer <token>`
//! - Response body: `{ "events": [...], "nextCursor": <number | string> }`
//!
//! 401 and 403 map to auth failures, every other non-2xx status and any
//! connection problem or timeout to network failures, and an undecodable
//! body to a parse failure.

pub mod http;
pub mod wire;

pub use http::{DEFAULT_ENDPOINT_PATH, DEFAULT_REQUEST_TIMEOUT, HttpTransport, HttpTransportConfig};
pub use wire::{classify_status, decode_batch};
