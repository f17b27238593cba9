//! Data-source services: the fetch contract and the in-memory mock fetcher.

pub mod event_service;

pub use event_service::{
    ConditionFilter, EventDataFetcher, FetchError, FetchParams, MockEventFetcher, SearchFilter,
};
