//! The event fetch contract and its in-memory mock implementation.
//!
//! The mock stands in for a backing API: every call sleeps for an artificial
//! delay before resolving, so the UI's loading states and stale-response
//! handling get exercised for real.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::catalog::FilterOperator;
use crate::events::{Event, mock_events};
use crate::query::Query;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("event data source unavailable: {0}")]
    Unavailable(String),
}

/// Optional pre-filters for a plain fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    /// Substring match against the department name.
    pub department: Option<String>,
    /// Lower bound on the event date, compared as `DD/MM/YYYY` strings.
    pub date_from: Option<String>,
}

/// A single flattened condition a search can carry instead of free text.
#[derive(Debug, Clone)]
pub struct ConditionFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
    pub negated: bool,
}

/// What a search filters by, beyond the free-text query.
#[derive(Debug, Clone)]
pub enum SearchFilter {
    /// One field/operator/value condition, evaluated against the dataset.
    Condition(ConditionFilter),
    /// A full compiled tree. The mock has no query engine behind it and
    /// returns a fixed slice, mirroring the demo backend.
    Complex(Query),
}

/// Async fetch contract the table component talks to.
#[allow(async_fn_in_trait)]
pub trait EventDataFetcher {
    async fn fetch_events(&self, params: FetchParams) -> Result<Vec<Event>, FetchError>;
    async fn fetch_event_by_id(&self, id: u32) -> Result<Option<Event>, FetchError>;
    async fn search_events(
        &self,
        text: &str,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<Event>, FetchError>;
}

/// Mock fetcher over the built-in demo dataset.
#[derive(Debug, Clone)]
pub struct MockEventFetcher {
    events: Vec<Event>,
    delay: Duration,
}

impl Default for MockEventFetcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl MockEventFetcher {
    pub fn new(delay: Duration) -> Self {
        Self { events: mock_events(), delay }
    }

    pub fn with_events(events: Vec<Event>, delay: Duration) -> Self {
        Self { events, delay }
    }

    async fn simulate_api_call(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

impl EventDataFetcher for MockEventFetcher {
    async fn fetch_events(&self, params: FetchParams) -> Result<Vec<Event>, FetchError> {
        let mut events = self.events.clone();
        if let Some(department) = &params.department {
            events.retain(|e| e.department.contains(department.as_str()));
        }
        if let Some(date_from) = &params.date_from {
            events.retain(|e| e.date.as_str() >= date_from.as_str());
        }
        self.simulate_api_call().await;
        Ok(events)
    }

    async fn fetch_event_by_id(&self, id: u32) -> Result<Option<Event>, FetchError> {
        let event = self.events.iter().find(|e| e.id == id).cloned();
        self.simulate_api_call().await;
        Ok(event)
    }

    async fn search_events(
        &self,
        text: &str,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<Event>, FetchError> {
        if text.is_empty() && filter.is_none() {
            return self.fetch_events(FetchParams::default()).await;
        }
        let events = match filter {
            Some(SearchFilter::Condition(condition)) => {
                let mut events = self.events.clone();
                events.retain(|e| condition.matches(e));
                events
            }
            Some(SearchFilter::Complex(query)) => {
                // Demo behavior: no query engine behind the mock, so a
                // compiled tree returns the first three events.
                debug!(query = ?query, "complex query search");
                self.events.iter().take(3).cloned().collect()
            }
            None => {
                let needle = text.to_lowercase();
                self.events
                    .iter()
                    .filter(|e| {
                        e.name.to_lowercase().contains(&needle)
                            || e.department.to_lowercase().contains(&needle)
                            || e.hall.to_lowercase().contains(&needle)
                    })
                    .cloned()
                    .collect()
            }
        };
        self.simulate_api_call().await;
        Ok(events)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl ConditionFilter {
    /// Evaluate this condition against one event. Text comparisons are
    /// case-insensitive; numeric operators coerce both sides to numbers and
    /// fail closed when coercion fails.
    pub fn matches(&self, event: &Event) -> bool {
        let field_value = event.field(&self.field);
        let matches = match self.operator {
            FilterOperator::Equals => value_text(&field_value) == value_text(&self.value),
            FilterOperator::NotEquals => value_text(&field_value) != value_text(&self.value),
            FilterOperator::Contains => value_text(&field_value)
                .to_lowercase()
                .contains(&value_text(&self.value).to_lowercase()),
            FilterOperator::StartsWith => value_text(&field_value)
                .to_lowercase()
                .starts_with(&value_text(&self.value).to_lowercase()),
            FilterOperator::EndsWith => value_text(&field_value)
                .to_lowercase()
                .ends_with(&value_text(&self.value).to_lowercase()),
            FilterOperator::GreaterThan => match (value_number(&field_value), value_number(&self.value)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            FilterOperator::LessThan => match (value_number(&field_value), value_number(&self.value)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            FilterOperator::Between => match self.value.as_array().filter(|a| a.len() == 2) {
                Some(bounds) if self.field == "date" => {
                    let v = value_text(&field_value);
                    v >= value_text(&bounds[0]) && v <= value_text(&bounds[1])
                }
                Some(bounds) => {
                    match (
                        value_number(&field_value),
                        value_number(&bounds[0]),
                        value_number(&bounds[1]),
                    ) {
                        (Some(v), Some(low), Some(high)) => v >= low && v <= high,
                        _ => false,
                    }
                }
                None => false,
            },
            FilterOperator::In => match self.value.as_array() {
                Some(items) => items.iter().any(|v| value_text(v) == value_text(&field_value)),
                None => false,
            },
            FilterOperator::NotIn => match self.value.as_array() {
                Some(items) => !items.iter().any(|v| value_text(v) == value_text(&field_value)),
                None => false,
            },
        };
        if self.negated { !matches } else { matches }
    }
}
