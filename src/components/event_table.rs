//! EventTable: the searchable, sortable, paginated event list.
//!
//! Fetches run as spawned tasks against the data source and come back as
//! actions on the app channel. Every fetch is stamped with a monotonically
//! increasing request id; a response whose id is not the latest issued one
//! is stale and gets dropped, so the last request sent always wins.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::action::Action;
use crate::components::Component;
use crate::config::{Config, Mode};
use crate::events::Event;
use crate::query::Query;
use crate::services::{EventDataFetcher, MockEventFetcher, SearchFilter};

pub const PAGE_SIZE: usize = 10;

/// Columns shown in the table: catalog field id and Hebrew header.
const COLUMNS: &[(&str, &str)] = &[
    ("id", "#"),
    ("name", "שם אירוע"),
    ("department", "מחלקה"),
    ("date", "תאריך"),
    ("hall", "אולם"),
    ("available", "זמינים"),
    ("sold", "נמכרו"),
    ("price", "מחיר"),
    ("status", "סטטוס"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortState {
    column: usize,
    ascending: bool,
}

pub struct EventTable {
    fetcher: MockEventFetcher,
    events: Vec<Event>,
    loading: bool,
    error: Option<String>,
    search_input: String,
    search_active: bool,
    applied_query: Option<Query>,
    sort: Option<SortState>,
    selected_column: usize,
    page: usize,
    request_seq: u64,
    action_tx: Option<UnboundedSender<Action>>,
    config: Config,
}

impl EventTable {
    pub fn new(fetcher: MockEventFetcher) -> Self {
        Self {
            fetcher,
            events: Vec::new(),
            loading: false,
            error: None,
            search_input: String::new(),
            search_active: false,
            applied_query: None,
            sort: None,
            selected_column: 1,
            page: 0,
            request_seq: 0,
            action_tx: None,
            config: Config::default(),
        }
    }

    pub fn apply_query(&mut self, query: Query) {
        self.applied_query = Some(query);
        self.page = 0;
        self.spawn_fetch();
    }

    pub fn is_searching(&self) -> bool {
        self.search_active
    }

    /// Issue a fetch for the current search state. Bumps the request id so
    /// any still-running fetch becomes stale.
    fn spawn_fetch(&mut self) {
        let Some(tx) = self.action_tx.clone() else { return };
        self.request_seq += 1;
        let request_id = self.request_seq;
        self.loading = true;
        self.error = None;
        let fetcher = self.fetcher.clone();
        let text = self.search_input.clone();
        let filter = self.applied_query.clone().map(SearchFilter::Complex);
        debug!(request_id, text = %text, has_query = filter.is_some(), "fetching events");
        tokio::spawn(async move {
            match fetcher.search_events(&text, filter).await {
                Ok(events) => {
                    let _ = tx.send(Action::EventsLoaded { request_id, events });
                }
                Err(e) => {
                    let _ = tx.send(Action::EventsFailed { request_id, message: e.to_string() });
                }
            }
        });
    }

    fn on_loaded(&mut self, request_id: u64, events: Vec<Event>) {
        if request_id != self.request_seq {
            debug!(request_id, latest = self.request_seq, "dropping stale fetch response");
            return;
        }
        self.events = events;
        self.loading = false;
        self.error = None;
        let pages = self.page_count();
        if self.page >= pages {
            self.page = pages.saturating_sub(1);
        }
    }

    fn on_failed(&mut self, request_id: u64, message: String) {
        if request_id != self.request_seq {
            debug!(request_id, latest = self.request_seq, "dropping stale fetch error");
            return;
        }
        self.loading = false;
        self.error = Some(message);
    }

    fn page_count(&self) -> usize {
        self.events.len().div_ceil(PAGE_SIZE).max(1)
    }

    /// Events in display order: the applied sort over the fetched list.
    fn sorted_events(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().collect();
        if let Some(sort) = self.sort {
            let field = COLUMNS[sort.column].0;
            events.sort_by(|a, b| {
                let ordering = compare_values(&a.field(field), &b.field(field));
                if sort.ascending { ordering } else { ordering.reverse() }
            });
        }
        events
    }

    fn visible_page(&self) -> Vec<&Event> {
        self.sorted_events()
            .into_iter()
            .skip(self.page * PAGE_SIZE)
            .take(PAGE_SIZE)
            .collect()
    }

    /// Cycle the selected column's sort: ascending, descending, off.
    fn toggle_sort(&mut self) {
        self.sort = match self.sort {
            Some(s) if s.column == self.selected_column && s.ascending => {
                Some(SortState { column: s.column, ascending: false })
            }
            Some(s) if s.column == self.selected_column => None,
            _ => Some(SortState { column: self.selected_column, ascending: true }),
        };
    }

    fn instructions(&self) -> String {
        if self.search_active {
            return "Enter: Search  Esc: Cancel".to_string();
        }
        self.config.actions_to_instructions(&[
            (Mode::EventTable, Action::StartSearch, "Search"),
            (Mode::EventTable, Action::OpenQueryBuilder, "Query Builder"),
            (Mode::EventTable, Action::ToggleSort, "Sort"),
            (Mode::EventTable, Action::ClearSearch, "Clear"),
            (Mode::EventTable, Action::Refresh, "Refresh"),
            (Mode::EventTable, Action::NextPage, "Next Page"),
            (Mode::Global, Action::Quit, "Quit"),
        ])
    }

    fn status_line(&self) -> Line<'static> {
        if self.loading {
            return Line::from(Span::styled(
                "טוען אירועים...",
                Style::default().fg(Color::Yellow),
            ));
        }
        if let Some(error) = &self.error {
            return Line::from(Span::styled(
                format!("שגיאה בטעינת אירועים: {error}"),
                Style::default().fg(Color::Red),
            ));
        }
        if self.events.is_empty() {
            return Line::from(Span::styled(
                "לא נמצאו אירועים",
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(Span::raw(format!(
            "עמוד {} מתוך {}  ({} אירועים)",
            self.page + 1,
            self.page_count(),
            self.events.len()
        )))
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Enter => {
                self.search_active = false;
                self.page = 0;
                self.spawn_fetch();
            }
            KeyCode::Esc => {
                self.search_active = false;
            }
            KeyCode::Backspace => {
                self.search_input.pop();
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
            }
            _ => {}
        }
        None
    }
}

/// Order two field values: numbers numerically, everything else as strings.
fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => {
            let x = a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string());
            let y = b.as_str().map(str::to_string).unwrap_or_else(|| b.to_string());
            x.cmp(&y)
        }
    }
}

fn cell_text(event: &Event, field: &str) -> String {
    match event.field(field) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Component for EventTable {
    fn register_action_handler(&mut self, tx: UnboundedSender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        self.config = config;
        Ok(())
    }

    fn init(&mut self, _area: ratatui::layout::Size) -> Result<()> {
        self.spawn_fetch();
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        if self.search_active {
            return Ok(self.handle_search_key(key));
        }
        if let Some(action) = self.config.action_for_key(Mode::Global, key) {
            match action {
                Action::Left => return Ok(Some(Action::PrevColumn)),
                Action::Right => return Ok(Some(Action::NextColumn)),
                _ => {}
            }
        }
        Ok(self.config.action_for_key(Mode::EventTable, key))
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::EventsLoaded { request_id, events } => self.on_loaded(request_id, events),
            Action::EventsFailed { request_id, message } => self.on_failed(request_id, message),
            Action::QueryApplied(query) => self.apply_query(query),
            Action::StartSearch => self.search_active = true,
            Action::ClearSearch => {
                self.search_input.clear();
                self.applied_query = None;
                self.page = 0;
                self.spawn_fetch();
            }
            Action::Refresh => self.spawn_fetch(),
            Action::ToggleSort => self.toggle_sort(),
            Action::NextColumn => {
                self.selected_column = (self.selected_column + 1) % COLUMNS.len();
            }
            Action::PrevColumn => {
                self.selected_column =
                    if self.selected_column == 0 { COLUMNS.len() - 1 } else { self.selected_column - 1 };
            }
            Action::NextPage => {
                if self.page + 1 < self.page_count() {
                    self.page += 1;
                }
            }
            Action::PrevPage => {
                self.page = self.page.saturating_sub(1);
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let [search_area, table_area, status_area, instructions_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        let search_style = if self.search_active {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let search_text = if self.search_active {
            format!("{}_", self.search_input)
        } else if self.search_input.is_empty() {
            "חיפוש אירועים...".to_string()
        } else {
            self.search_input.clone()
        };
        let search = Paragraph::new(search_text)
            .style(search_style)
            .block(Block::default().borders(Borders::ALL).title("חיפוש"));
        frame.render_widget(search, search_area);

        let header = Row::new(COLUMNS.iter().enumerate().map(|(i, (_, title))| {
            let mut text = title.to_string();
            if let Some(sort) = self.sort
                && sort.column == i
            {
                text.push(' ');
                text.push(if sort.ascending { '↑' } else { '↓' });
            }
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if i == self.selected_column {
                style = style.fg(Color::Black).bg(Color::Cyan);
            }
            Cell::from(text).style(style)
        }))
        .height(1);

        let rows: Vec<Row> = self
            .visible_page()
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let cells = COLUMNS.iter().map(|(field, _)| Cell::from(cell_text(event, field)));
                let mut row = Row::new(cells);
                if i % 2 == 0 {
                    row = row.style(Style::default().bg(Color::Rgb(30, 30, 30)));
                }
                row
            })
            .collect();

        let widths: Vec<Constraint> = COLUMNS
            .iter()
            .map(|(field, _)| match *field {
                "id" => Constraint::Length(4),
                "name" => Constraint::Min(20),
                _ => Constraint::Length(12),
            })
            .collect();

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("אירועים"));
        frame.render_widget(table, table_area);

        frame.render_widget(Paragraph::new(self.status_line()), status_area);
        frame.render_widget(
            Paragraph::new(self.instructions()).style(Style::default().fg(Color::Yellow)),
            instructions_area,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::events::mock_events;

    fn table_with_events() -> EventTable {
        let mut table = EventTable::new(MockEventFetcher::default());
        table.request_seq = 1;
        table.on_loaded(1, mock_events());
        table
    }

    #[test]
    fn test_stale_responses_are_dropped() {
        let mut table = EventTable::new(MockEventFetcher::default());
        table.request_seq = 2;
        // Response for request 1 arrives after request 2 was issued.
        table.on_loaded(1, mock_events());
        assert!(table.events.is_empty());
        table.on_loaded(2, mock_events());
        assert_eq!(table.events.len(), 7);
    }

    #[test]
    fn test_stale_errors_are_dropped() {
        let mut table = table_with_events();
        table.request_seq = 5;
        table.on_failed(3, "timeout".into());
        assert!(table.error.is_none());
        table.on_failed(5, "timeout".into());
        assert_eq!(table.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_sort_cycles_asc_desc_off() {
        let mut table = table_with_events();
        table.selected_column = 7; // price
        table.toggle_sort();
        let first = table.sorted_events()[0].id;
        assert_eq!(first, 6); // cheapest: 50
        table.toggle_sort();
        let first = table.sorted_events()[0].id;
        assert_eq!(first, 5); // priciest: 150
        table.toggle_sort();
        assert!(table.sort.is_none());
        assert_eq!(table.sorted_events()[0].id, 1);
    }

    #[test]
    fn test_pagination_clamps() {
        let mut table = table_with_events();
        assert_eq!(table.page_count(), 1);
        table.update(Action::NextPage).unwrap();
        assert_eq!(table.page, 0);

        // 23 events: three pages.
        let mut many = Vec::new();
        for copy in 0..23u32 {
            let mut e = mock_events()[0].clone();
            e.id = copy + 1;
            many.push(e);
        }
        table.request_seq = 2;
        table.on_loaded(2, many);
        assert_eq!(table.page_count(), 3);
        table.update(Action::NextPage).unwrap();
        table.update(Action::NextPage).unwrap();
        table.update(Action::NextPage).unwrap();
        assert_eq!(table.page, 2);
        assert_eq!(table.visible_page().len(), 3);
        table.update(Action::PrevPage).unwrap();
        assert_eq!(table.page, 1);
        assert_eq!(table.visible_page().len(), PAGE_SIZE);
    }

    #[test]
    fn test_page_resets_when_results_shrink() {
        let mut table = table_with_events();
        let mut many = Vec::new();
        for copy in 0..23u32 {
            let mut e = mock_events()[0].clone();
            e.id = copy + 1;
            many.push(e);
        }
        table.request_seq = 2;
        table.on_loaded(2, many);
        table.page = 2;
        table.request_seq = 3;
        table.on_loaded(3, mock_events());
        assert_eq!(table.page, 0);
    }

    #[test]
    fn test_search_input_editing() {
        let mut table = table_with_events();
        table.update(Action::StartSearch).unwrap();
        assert!(table.is_searching());
        table.handle_search_key(KeyEvent::from(KeyCode::Char('ג')));
        table.handle_search_key(KeyEvent::from(KeyCode::Char('x')));
        table.handle_search_key(KeyEvent::from(KeyCode::Backspace));
        assert_eq!(table.search_input, "ג");
        table.handle_search_key(KeyEvent::from(KeyCode::Esc));
        assert!(!table.is_searching());
    }
}
