use serde::{Deserialize, Serialize};
use strum::Display;

use crate::events::Event;
use crate::query::Query;

/// High-level actions that can be triggered by UI or components.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Suspend,
    Resume,
    Quit,
    ClearScreen,
    Error(String),
    Help,

    // Navigation primitives, bound in the Global mode
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Backspace,
    Tab,
    ToggleInstructions,
    /// Close any active dialog
    DialogClose,

    // Event table actions
    /// Open the query builder dialog
    OpenQueryBuilder,
    /// Start editing the free-text search line
    StartSearch,
    /// Clear the search line and any applied query, then refetch
    ClearSearch,
    /// Refetch events with the current search state
    Refresh,
    /// Cycle the selected column's sort: ascending, descending, off
    ToggleSort,
    NextColumn,
    PrevColumn,
    NextPage,
    PrevPage,

    // Query builder actions
    /// Add a condition to the selected group
    AddCondition,
    /// Add a nested group to the selected group
    AddGroup,
    /// Toggle the selected group between AND and OR
    ToggleGroupOperator,
    /// Toggle the connective of the gap after the selected node
    ToggleGapOperator,
    /// Toggle NOT on the selected node
    ToggleNegated,
    /// Delete the selected node
    DeleteNode,
    /// Reset to a fresh query with one default condition
    ResetQuery,
    /// Open the save-query name prompt
    SaveQuery,
    /// Open the saved-query pick list
    LoadQuery,
    /// Apply the current query and close the dialog
    ApplyQuery,

    // Results of dialog and async work
    /// User applied a query from the builder
    QueryApplied(Query),
    /// A fetch resolved. Stale request ids are discarded by the table.
    EventsLoaded { request_id: u64, events: Vec<Event> },
    /// A fetch failed; shown as an inline error line
    EventsFailed { request_id: u64, message: String },
    /// Show a transient message dialog
    ShowMessage(String),
}
