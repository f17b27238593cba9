//! Top-level application component.
//!
//! Owns the event table, the toolbar, and the dialogs, and routes key events
//! and actions between them. Dialogs get keys first; actions emitted by any
//! component come back through one unbounded channel and are drained every
//! loop iteration.

use color_eyre::Result;
use crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect, Size};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::action::Action;
use crate::catalog::event_field_catalog;
use crate::components::Component;
use crate::components::event_table::EventTable;
use crate::components::toolbar::Toolbar;
use crate::config::{Config, Mode};
use crate::dialog::{MessageDialog, QueryBuilderDialog};
use crate::services::MockEventFetcher;

pub struct App {
    config: Config,
    table: EventTable,
    toolbar: Toolbar,
    query_builder: QueryBuilderDialog,
    message: Option<MessageDialog>,
    show_query_builder: bool,
    builder_rows: usize,
    action_tx: UnboundedSender<Action>,
    action_rx: UnboundedReceiver<Action>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, fetcher: MockEventFetcher) -> Result<Self> {
        let (action_tx, action_rx) = unbounded_channel();
        let mut table = EventTable::new(fetcher);
        table.register_action_handler(action_tx.clone())?;
        table.register_config_handler(config.clone())?;
        let mut query_builder = QueryBuilderDialog::new(event_field_catalog());
        query_builder.register_config_handler(config.clone())?;
        Ok(Self {
            config,
            table,
            toolbar: Toolbar::default(),
            query_builder,
            message: None,
            show_query_builder: false,
            builder_rows: 10,
            action_tx,
            action_rx,
            should_quit: false,
        })
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn action_tx(&self) -> UnboundedSender<Action> {
        self.action_tx.clone()
    }

    /// Apply actions queued by spawned tasks since the last iteration.
    pub fn drain_pending(&mut self) -> Result<()> {
        while let Ok(action) = self.action_rx.try_recv() {
            self.dispatch(action)?;
        }
        Ok(())
    }

    /// Route one action to whoever owns it.
    fn dispatch(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::OpenQueryBuilder => self.show_query_builder = true,
            Action::ShowMessage(text) => self.message = Some(MessageDialog::new(text)),
            Action::Error(text) => {
                self.message = Some(MessageDialog::with_title(text, "Error"));
            }
            other => {
                if let Some(follow_up) = self.table.update(other)? {
                    self.dispatch(follow_up)?;
                }
            }
        }
        Ok(())
    }

    fn handle_builder_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::DialogClose => self.show_query_builder = false,
            Action::QueryApplied(query) => {
                debug!("query applied from builder");
                self.show_query_builder = false;
                self.dispatch(Action::QueryApplied(query))?;
            }
            other => self.dispatch(other)?,
        }
        Ok(())
    }

    /// Centered overlay area for the query builder.
    fn builder_area(area: Rect) -> Rect {
        let [_, vertical, _] = Layout::vertical([
            Constraint::Percentage(8),
            Constraint::Percentage(84),
            Constraint::Percentage(8),
        ])
        .areas(area);
        let [_, horizontal, _] = Layout::horizontal([
            Constraint::Percentage(10),
            Constraint::Percentage(80),
            Constraint::Percentage(10),
        ])
        .areas(vertical);
        horizontal
    }
}

impl Component for App {
    fn init(&mut self, area: Size) -> Result<()> {
        self.table.init(area)
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        if let Some(dialog) = self.message.as_mut() {
            if let Some(Action::DialogClose) = dialog.handle_key_event(key)? {
                self.message = None;
            }
            return Ok(None);
        }
        if self.show_query_builder {
            if let Some(action) = self.query_builder.handle_key(key, self.builder_rows) {
                self.handle_builder_action(action)?;
            }
            return Ok(None);
        }
        if !self.table.is_searching()
            && let Some(global) = self.config.action_for_key(Mode::Global, key)
        {
            match global {
                Action::Quit => {
                    self.should_quit = true;
                    return Ok(None);
                }
                Action::Tab => {
                    self.toolbar.select_next();
                    return Ok(None);
                }
                Action::Enter => {
                    let action = self.toolbar.selected_action();
                    self.dispatch(action)?;
                    return Ok(None);
                }
                _ => {}
            }
        }
        if let Some(action) = self.table.handle_key_event(key)? {
            self.dispatch(action)?;
        }
        Ok(None)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        self.dispatch(action)?;
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let [main_area, toolbar_area] =
            Layout::vertical([Constraint::Min(8), Constraint::Length(2)]).areas(area);
        self.table.draw(frame, main_area)?;
        self.toolbar.draw(frame, toolbar_area)?;
        if self.show_query_builder {
            let overlay = Self::builder_area(area);
            self.builder_rows = self.query_builder.render(overlay, frame.buffer_mut());
        }
        if let Some(dialog) = self.message.as_mut() {
            dialog.draw(frame, area)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyModifiers};
    use pretty_assertions::assert_eq;

    use super::*;

    fn app() -> App {
        let config: Config = json5::from_str(include_str!("../.config/config.json5")).unwrap();
        App::new(config, MockEventFetcher::default()).unwrap()
    }

    #[test]
    fn test_quit_key_sets_flag() {
        let mut app = app();
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        app.handle_key_event(key).unwrap();
        assert!(app.should_quit());
    }

    #[test]
    fn test_open_and_close_query_builder() {
        let mut app = app();
        app.handle_key_event(KeyEvent::from(KeyCode::Char('f'))).unwrap();
        assert!(app.show_query_builder);
        app.handle_key_event(KeyEvent::from(KeyCode::Esc)).unwrap();
        assert!(!app.show_query_builder);
    }

    #[test]
    fn test_toolbar_enter_dispatches_selected_button() {
        let mut app = app();
        // Tab to the second button (advanced search), Enter opens the builder.
        app.handle_key_event(KeyEvent::from(KeyCode::Tab)).unwrap();
        app.handle_key_event(KeyEvent::from(KeyCode::Enter)).unwrap();
        assert!(app.show_query_builder);
    }

    #[test]
    fn test_message_dialog_swallows_keys_until_closed() {
        let mut app = app();
        app.update(Action::ShowMessage("שגיאה".into())).unwrap();
        app.handle_key_event(KeyEvent::from(KeyCode::Char('f'))).unwrap();
        assert!(!app.show_query_builder);
        app.handle_key_event(KeyEvent::from(KeyCode::Enter)).unwrap();
        assert!(app.message.is_none());
    }

    #[test]
    fn test_builder_area_is_centered() {
        let area = Rect::new(0, 0, 100, 50);
        let overlay = App::builder_area(area);
        assert!(overlay.x > 0 && overlay.width < area.width);
        assert!(overlay.y > 0 && overlay.height < area.height);
        assert_eq!(overlay.width, 80);
    }
}
