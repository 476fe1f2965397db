//! Filter expressions and their compiled predicates
//!
//! A [`FilterExpression`] is what the host edits and persists. [`compile`]
//! turns it into an [`EventPredicate`] once per change; the predicate is the
//! only thing evaluated per event during projection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tailscope_core::{Event, EventCategory};

/// Category criterion: everything, or an explicit set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BTreeSet<EventCategory>),
}

impl CategoryFilter {
    pub fn only<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = EventCategory>,
    {
        CategoryFilter::Only(categories.into_iter().collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, CategoryFilter::All)
    }
}

/// User-editable filter state
///
/// Every field left at its default is inactive and accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterExpression {
    pub categories: CategoryFilter,
    /// Exact match on the event's correlation (request) id
    pub correlation_id: Option<String>,
    /// When false, successful events are hidden
    pub show_successes: bool,
    /// Case-insensitive substring over path, message, correlation id, error
    pub search: String,
}

impl Default for FilterExpression {
    fn default() -> Self {
        Self {
            categories: CategoryFilter::All,
            correlation_id: None,
            show_successes: true,
            search: String::new(),
        }
    }
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(mut self, categories: CategoryFilter) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_show_successes(mut self, show: bool) -> Self {
        self.show_successes = show;
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = text.into();
        self
    }

    /// True when no criterion is active
    pub fn is_empty(&self) -> bool {
        compile(self).accepts_all()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Criterion {
    Categories(BTreeSet<EventCategory>),
    CorrelationId(String),
    HideSuccesses,
    /// Needle is stored lowercased
    Text(String),
}

impl Criterion {
    fn matches(&self, event: &Event) -> bool {
        match self {
            Criterion::Categories(set) => set.contains(&event.category),
            Criterion::CorrelationId(id) => event.correlation_id.as_deref() == Some(id.as_str()),
            Criterion::HideSuccesses => !event.is_success(),
            Criterion::Text(needle) => event
                .searchable_fields()
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Conjunction of compiled criteria
///
/// An empty predicate accepts every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPredicate {
    criteria: Vec<Criterion>,
}

impl EventPredicate {
    /// Predicate that accepts everything
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Predicate restricting events to the given categories
    pub fn categories<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = EventCategory>,
    {
        Self {
            criteria: vec![Criterion::Categories(categories.into_iter().collect())],
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.criteria.iter().all(|c| c.matches(event))
    }

    /// Intersection of two predicates
    pub fn and(mut self, other: EventPredicate) -> Self {
        self.criteria.extend(other.criteria);
        self
    }

    pub fn accepts_all(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Number of active criteria
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// Compile a filter expression into a predicate
pub fn compile(filter: &FilterExpression) -> EventPredicate {
    let mut criteria = Vec::new();

    if let CategoryFilter::Only(set) = &filter.categories {
        criteria.push(Criterion::Categories(set.clone()));
    }

    if let Some(id) = filter.correlation_id.as_deref().map(str::trim) {
        if !id.is_empty() {
            criteria.push(Criterion::CorrelationId(id.to_string()));
        }
    }

    if !filter.show_successes {
        criteria.push(Criterion::HideSuccesses);
    }

    if !filter.search.trim().is_empty() {
        criteria.push(Criterion::Text(filter.search.trim().to_lowercase()));
    }

    EventPredicate { criteria }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailscope_core::{EventPayload, EventStatus, FunctionCall};

    fn call(category: EventCategory, path: &str, status: EventStatus) -> Event {
        Event::new(
            1,
            category,
            EventPayload::Function(FunctionCall {
                path: path.to_string(),
                message: Some(format!("ran {}", path)),
                error: None,
                execution_time_ms: None,
            }),
        )
        .with_status(status)
    }

    fn sample() -> Vec<Event> {
        vec![
            call(EventCategory::Query, "users:list", EventStatus::Success),
            call(EventCategory::Mutation, "users:create", EventStatus::Error)
                .with_correlation_id("req-1"),
            call(EventCategory::Action, "Mail:Send", EventStatus::Success)
                .with_correlation_id("req-2"),
        ]
    }

    fn accepted<'a>(predicate: &EventPredicate, events: &'a [Event]) -> Vec<&'a Event> {
        events.iter().filter(|e| predicate.matches(e)).collect()
    }

    #[test]
    fn test_default_filter_accepts_all() {
        let predicate = compile(&FilterExpression::default());
        assert!(predicate.accepts_all());
        assert_eq!(accepted(&predicate, &sample()).len(), 3);
        assert!(FilterExpression::default().is_empty());
    }

    #[test]
    fn test_category_criterion() {
        let filter = FilterExpression::new()
            .with_categories(CategoryFilter::only([EventCategory::Query, EventCategory::Action]));
        let predicate = compile(&filter);
        assert_eq!(predicate.len(), 1);

        let events = sample();
        let hits = accepted(&predicate, &events);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|e| e.category != EventCategory::Mutation));
    }

    #[test]
    fn test_empty_category_set_matches_nothing() {
        let filter = FilterExpression::new().with_categories(CategoryFilter::only([]));
        assert!(accepted(&compile(&filter), &sample()).is_empty());
    }

    #[test]
    fn test_correlation_id_is_exact() {
        let events = sample();
        let filter = FilterExpression::new().with_correlation_id("req-1");
        let hits = accepted(&compile(&filter), &events);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].correlation_id.as_deref(), Some("req-1"));

        let filter = FilterExpression::new().with_correlation_id("req");
        assert!(accepted(&compile(&filter), &events).is_empty());

        let filter = FilterExpression::new().with_correlation_id("  ");
        assert!(compile(&filter).accepts_all());
    }

    #[test]
    fn test_hide_successes() {
        let filter = FilterExpression::new().with_show_successes(false);
        let events = sample();
        let hits = accepted(&compile(&filter), &events);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].status, EventStatus::Error);
    }

    #[test]
    fn test_text_search_is_case_insensitive() {
        let events = sample();

        let filter = FilterExpression::new().with_search("mail:send");
        assert_eq!(accepted(&compile(&filter), &events).len(), 1);

        // Matches through the correlation id field
        let filter = FilterExpression::new().with_search("REQ-2");
        assert_eq!(accepted(&compile(&filter), &events).len(), 1);

        let filter = FilterExpression::new().with_search("users");
        assert_eq!(accepted(&compile(&filter), &events).len(), 2);

        let filter = FilterExpression::new().with_search("   ");
        assert!(compile(&filter).accepts_all());
    }

    #[test]
    fn test_text_search_ignores_surrounding_whitespace() {
        let events = sample();

        let filter = FilterExpression::new().with_search("  users ");
        assert_eq!(accepted(&compile(&filter), &events).len(), 2);

        let filter = FilterExpression::new().with_search("\tMail:Send\n");
        assert_eq!(accepted(&compile(&filter), &events).len(), 1);
    }

    #[test]
    fn test_text_search_covers_error_text() {
        let event = Event::new(
            5,
            EventCategory::Mutation,
            EventPayload::Function(FunctionCall {
                path: "tasks:update".into(),
                message: None,
                error: Some("Document not found".into()),
                execution_time_ms: Some(3.0),
            }),
        );
        let predicate = compile(&FilterExpression::new().with_search("not found"));
        assert!(predicate.matches(&event));
    }

    #[test]
    fn test_composition_is_intersection() {
        let events = sample();
        let f1 = FilterExpression::new()
            .with_categories(CategoryFilter::only([EventCategory::Mutation, EventCategory::Action]));
        let f2 = FilterExpression::new().with_show_successes(false);

        let combined = compile(&f1).and(compile(&f2));
        for event in &events {
            assert_eq!(
                combined.matches(event),
                compile(&f1).matches(event) && compile(&f2).matches(event)
            );
        }
        assert_eq!(accepted(&combined, &events).len(), 1);
    }

    #[test]
    fn test_all_criteria_and_together() {
        let filter = FilterExpression::new()
            .with_categories(CategoryFilter::only([EventCategory::Mutation]))
            .with_correlation_id("req-1")
            .with_show_successes(false)
            .with_search("create");
        let predicate = compile(&filter);
        assert_eq!(predicate.len(), 4);
        assert_eq!(accepted(&predicate, &sample()).len(), 1);
    }

    #[test]
    fn test_filter_expression_serde() {
        let filter = FilterExpression::new()
            .with_categories(CategoryFilter::only([EventCategory::Console]))
            .with_search("boom");
        let json = serde_json::to_string(&filter).unwrap();
        let back: FilterExpression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);

        let partial: FilterExpression = serde_json::from_str(r#"{"search":"x"}"#).unwrap();
        assert!(partial.show_successes);
        assert!(partial.categories.is_all());
    }
}
