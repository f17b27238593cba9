//! Async integration tests against the mock event data source.

use std::time::Duration;

use eventtui::catalog::FilterOperator;
use eventtui::query::Query;
use eventtui::services::{
    ConditionFilter, EventDataFetcher, FetchParams, MockEventFetcher, SearchFilter,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fetcher() -> MockEventFetcher {
    MockEventFetcher::new(Duration::from_millis(1))
}

#[tokio::test]
async fn free_text_search_matches_hebrew_names() {
    let events = fetcher().search_events("ליר", None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "המלך ליר");
}

#[tokio::test]
async fn condition_filter_narrows_by_operator_and_negation() {
    let filter = ConditionFilter {
        field: "status".into(),
        operator: FilterOperator::Equals,
        value: json!("פעיל"),
        negated: true,
    };
    let events = fetcher()
        .search_events("", Some(SearchFilter::Condition(filter)))
        .await
        .unwrap();
    let ids: Vec<u32> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![4, 7]);
}

#[tokio::test]
async fn complex_query_returns_the_demo_slice() {
    let events = fetcher()
        .search_events("ignored", Some(SearchFilter::Complex(Query::new())))
        .await
        .unwrap();
    let ids: Vec<u32> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn fetch_params_filter_by_date_lower_bound() {
    let params = FetchParams { department: None, date_from: Some("20/05/2025".into()) };
    let events = fetcher().fetch_events(params).await.unwrap();
    assert!(events.iter().all(|e| e.date.as_str() >= "20/05/2025"));
    assert!(!events.is_empty());
}
