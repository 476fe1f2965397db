//! Panel application state and its persistence
//!
//! Everything the host's panel chrome remembers between sessions lives in
//! [`PanelState`], which is handed to the engine at construction. Only the
//! filter and the active view are persisted, as JSON strings in a
//! [`KeyValueStore`].

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tailscope_core::EventCategory;

use crate::circuit::TripReason;
use crate::filter::{EventPredicate, FilterExpression};
use crate::window::RowMode;

/// Store key for the last filter expression
pub const FILTER_KEY: &str = "tailscope.filter";

/// Store key for the last active view
pub const VIEW_KEY: &str = "tailscope.view";

/// Minimal string key-value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) {
        (**self).set(key, value)
    }
}

/// In-process store, useful for tests and hosts without storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

/// Which tab of the panel is showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    /// Function invocations and their console output
    #[default]
    Logs,
    /// Outgoing network calls
    Network,
}

impl ActiveView {
    pub fn includes(&self, category: EventCategory) -> bool {
        match self {
            ActiveView::Logs => category.is_function() || category == EventCategory::Console,
            ActiveView::Network => category == EventCategory::Network,
        }
    }

    /// Category restriction implied by the view
    pub fn predicate(&self) -> EventPredicate {
        EventPredicate::categories(
            EventCategory::all()
                .iter()
                .copied()
                .filter(|c| self.includes(*c)),
        )
    }
}

/// Panel chrome state owned by the host and passed into the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelState {
    pub active_view: ActiveView,
    pub row_mode: RowMode,
    pub filter: FilterExpression,
    pub sidebar_collapsed: bool,
}

impl PanelState {
    /// Restore persisted fields over `self`
    ///
    /// Missing or unreadable entries leave the current value in place.
    pub fn restored_from(mut self, store: &dyn KeyValueStore) -> Self {
        if let Some(filter) = load_json::<FilterExpression>(store, FILTER_KEY) {
            self.filter = filter;
        }
        if let Some(view) = load_json::<ActiveView>(store, VIEW_KEY) {
            self.active_view = view;
        }
        self
    }

    /// Load from a store, starting from defaults
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self::default().restored_from(store)
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        save_json(store, FILTER_KEY, &self.filter);
        save_json(store, VIEW_KEY, &self.active_view);
    }
}

fn load_json<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Ignoring unreadable persisted value");
            None
        }
    }
}

pub(crate) fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, json),
        Err(e) => warn!(key, error = %e, "Failed to persist value"),
    }
}

/// What the host should show in place of (or above) the rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    /// No successful poll yet
    Loading,
    /// Polled, but nothing matches the filter
    Empty,
    Ready,
    /// Polling stopped until the connection is retried
    Disabled { reason: TripReason },
}

impl PanelStatus {
    pub fn derive(has_polled: bool, matching: usize, tripped: Option<TripReason>) -> Self {
        match tripped {
            Some(reason) => PanelStatus::Disabled { reason },
            None if !has_polled => PanelStatus::Loading,
            None if matching == 0 => PanelStatus::Empty,
            None => PanelStatus::Ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CategoryFilter;
    use tailscope_core::{Event, EventPayload};

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("k", "v".into());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_panel_state_persists_filter_and_view() {
        let store = MemoryStore::new();
        let state = PanelState {
            active_view: ActiveView::Network,
            row_mode: RowMode::Collapsed,
            filter: FilterExpression::new().with_search("timeout"),
            sidebar_collapsed: true,
        };
        state.save(&store);

        let restored = PanelState::load(&store);
        assert_eq!(restored.active_view, ActiveView::Network);
        assert_eq!(restored.filter.search, "timeout");
        // Chrome-only fields are not persisted
        assert_eq!(restored.row_mode, RowMode::Normal);
        assert!(!restored.sidebar_collapsed);
    }

    #[test]
    fn test_corrupt_entry_is_ignored() {
        let store = MemoryStore::new();
        store.set(FILTER_KEY, "{not json".into());
        store.set(VIEW_KEY, "\"network\"".into());

        let initial = PanelState {
            filter: FilterExpression::new().with_show_successes(false),
            ..Default::default()
        };
        let restored = initial.restored_from(&store);
        assert!(!restored.filter.show_successes);
        assert_eq!(restored.active_view, ActiveView::Network);
    }

    #[test]
    fn test_view_predicates() {
        let console = Event::new(1, EventCategory::Console, EventPayload::default());
        let network = Event::new(1, EventCategory::Network, EventPayload::default());
        let query = Event::new(1, EventCategory::Query, EventPayload::default());

        let logs = ActiveView::Logs.predicate();
        assert!(logs.matches(&console) && logs.matches(&query) && !logs.matches(&network));

        let net = ActiveView::Network.predicate();
        assert!(net.matches(&network) && !net.matches(&console));

        let narrowed = crate::filter::compile(
            &FilterExpression::new().with_categories(CategoryFilter::only([EventCategory::Network])),
        )
        .and(ActiveView::Logs.predicate());
        assert!(!narrowed.matches(&network));
    }

    #[test]
    fn test_panel_status_derivation() {
        assert_eq!(PanelStatus::derive(false, 0, None), PanelStatus::Loading);
        assert_eq!(PanelStatus::derive(true, 0, None), PanelStatus::Empty);
        assert_eq!(PanelStatus::derive(true, 3, None), PanelStatus::Ready);
        assert_eq!(
            PanelStatus::derive(false, 0, Some(TripReason::Auth)),
            PanelStatus::Disabled { reason: TripReason::Auth }
        );
    }
}
