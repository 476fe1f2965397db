//! Engine configuration and presets
//!
//! A flat configuration object with documented defaults. Hosts own loading
//! and parsing; the engine only validates what it is handed and refuses to
//! start on invalid values.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tailscope_core::ConfigError;

use crate::filter::FilterExpression;

/// Default delay between the end of one poll and the start of the next
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default buffer capacity
pub const DEFAULT_MAX_STORED_LOGS: usize = 10_000;

/// Default number of consecutive failures before polling is disabled
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Preset configurations for common embeddings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Balanced defaults for an interactive panel
    #[default]
    Default,
    /// Tight polling for watching a deployment under active development
    /// - 250ms interval
    /// - 5000 stored events
    Realtime,
    /// Gentle polling for a panel left open in the background
    /// - 5s interval
    /// - 2000 stored events
    Background,
}

impl Preset {
    pub fn poll_interval(&self) -> Duration {
        match self {
            Preset::Default => DEFAULT_POLL_INTERVAL,
            Preset::Realtime => Duration::from_millis(250),
            Preset::Background => Duration::from_secs(5),
        }
    }

    pub fn max_stored_logs(&self) -> usize {
        match self {
            Preset::Default => DEFAULT_MAX_STORED_LOGS,
            Preset::Realtime => 5_000,
            Preset::Background => 2_000,
        }
    }
}

/// Configuration for a tailing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between the completion of one poll and the next scheduled one
    pub poll_interval: Duration,
    /// Buffer capacity; oldest events are evicted past this
    pub max_stored_logs: usize,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Filter applied until the host (or persisted state) replaces it
    pub initial_filter: FilterExpression,
    /// Whether the host should offer a request-id filter control
    pub show_request_id_filter: bool,
    /// Whether the host should offer a buffer-limit control
    pub show_limit_control: bool,
    /// Whether the host should offer the "show successes" toggle
    pub show_success_toggle: bool,
    /// Start polling immediately (live) or paused
    pub start_live: bool,
    /// Label attached to the engine's tracing span
    pub source_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_stored_logs: DEFAULT_MAX_STORED_LOGS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            initial_filter: FilterExpression::default(),
            show_request_id_filter: true,
            show_limit_control: true,
            show_success_toggle: true,
            start_live: true,
            source_label: "deployment".to_string(),
        }
    }
}

impl EngineConfig {
    /// Configuration for a preset
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            poll_interval: preset.poll_interval(),
            max_stored_logs: preset.max_stored_logs(),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_stored_logs(mut self, capacity: usize) -> Self {
        self.max_stored_logs = capacity;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_initial_filter(mut self, filter: FilterExpression) -> Self {
        self.initial_filter = filter;
        self
    }

    pub fn with_start_live(mut self, live: bool) -> Self {
        self.start_live = live;
        self
    }

    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    /// Check every field, failing on the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_poll_interval(self.poll_interval)?;
        validate_capacity(self.max_stored_logs)?;
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }

    /// Which optional controls the host should render
    pub fn controls(&self) -> ControlFlags {
        ControlFlags {
            request_id_filter: self.show_request_id_filter,
            limit_control: self.show_limit_control,
            success_toggle: self.show_success_toggle,
        }
    }
}

/// Optional controls a host may render next to the event list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    pub request_id_filter: bool,
    pub limit_control: bool,
    pub success_toggle: bool,
}

pub(crate) fn validate_poll_interval(interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::ZeroInterval);
    }
    Ok(())
}

pub(crate) fn validate_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::ZeroCapacity);
    }
    Ok(())
}
