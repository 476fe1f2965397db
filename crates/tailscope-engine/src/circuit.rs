//! Consecutive-failure circuit breaker
//!
//! Counts failed polls in a row. Once the count reaches the threshold, or a
//! single authorization failure is seen, polling is disabled until the host
//! asks to retry the connection.

use serde::{Deserialize, Serialize};
use tailscope_core::{ConfigError, FetchErrorKind, FetchOutcome};

/// Observable breaker state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    pub consecutive_failures: u32,
    pub disabled: bool,
}

/// Why the breaker opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    /// Too many failures in a row
    Threshold,
    /// The deployment rejected our credentials
    Auth,
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripReason::Threshold => write!(f, "too many consecutive fetch failures"),
            TripReason::Auth => write!(f, "authorization rejected"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    state: CircuitState,
    reason: Option<TripReason>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(Self {
            threshold,
            state: CircuitState::default(),
            reason: None,
        })
    }

    /// Feed one poll outcome and return the resulting state
    pub fn record(&mut self, outcome: &FetchOutcome) -> CircuitState {
        match outcome.failure_kind() {
            None => self.record_success(),
            Some(kind) => self.record_failure(kind),
        }
    }

    pub fn record_success(&mut self) -> CircuitState {
        self.state.consecutive_failures = 0;
        self.state
    }

    pub fn record_failure(&mut self, kind: FetchErrorKind) -> CircuitState {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);

        if !self.state.disabled {
            if kind == FetchErrorKind::Auth {
                self.trip(TripReason::Auth);
            } else if self.state.consecutive_failures >= self.threshold {
                self.trip(TripReason::Threshold);
            }
        }
        self.state
    }

    fn trip(&mut self, reason: TripReason) {
        self.state.disabled = true;
        self.reason = Some(reason);
    }

    /// Close the breaker ("retry connection")
    pub fn reset(&mut self) -> CircuitState {
        self.state = CircuitState::default();
        self.reason = None;
        self.state
    }

    pub fn is_disabled(&self) -> bool {
        self.state.disabled
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Reason for the current trip, if disabled
    pub fn trip_reason(&self) -> Option<TripReason> {
        self.reason
    }
}
