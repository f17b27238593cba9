#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod action;
pub mod app;
pub mod catalog;
pub mod components;
pub mod config;
pub mod dialog;
pub mod events;
pub mod logging;
pub mod query;
pub mod services;
pub mod tui;

// Re-export commonly used types
pub use action::Action;
pub use catalog::{FieldCatalog, FilterOperator, FilterType, event_field_catalog};
pub use query::{CompiledQuery, Query, compile};
