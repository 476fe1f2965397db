//! Event identity for deduplication
//!
//! Two events with equal [`IdentityKey`] are the same occurrence. The key
//! combines the timestamp and correlation id with a short blake3 digest of
//! everything else, which is plenty for the event volumes a panel holds.

use std::fmt;

use crate::event::Event;

/// Length of the payload digest in bytes
pub const DIGEST_LEN: usize = 16;

/// Stable identity of an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub timestamp: i64,
    pub correlation_id: Option<String>,
    pub digest: [u8; DIGEST_LEN],
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.timestamp,
            self.correlation_id.as_deref().unwrap_or("-"),
            hex::encode(self.digest)
        )
    }
}

/// Compute the identity of an event
pub fn identity_of(event: &Event) -> IdentityKey {
    let mut hasher = blake3::Hasher::new();
    // Category and status go into the digest so a success and an error
    // outcome with an identical payload stay distinct.
    let body = (&event.category, &event.status, &event.payload);
    if serde_json::to_writer(&mut hasher, &body).is_err() {
        hasher.update(event.summary().as_bytes());
    }

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize().as_bytes()[..DIGEST_LEN]);

    IdentityKey {
        timestamp: event.timestamp,
        correlation_id: event.correlation_id.clone(),
        digest,
    }
}

impl Event {
    /// Shorthand for [`identity_of`]
    pub fn identity(&self) -> IdentityKey {
        identity_of(self)
    }
}
