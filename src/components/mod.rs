pub mod dialog_layout;
pub mod event_table;
pub mod toolbar;

use color_eyre::Result;
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::Frame;
use ratatui::layout::{Rect, Size};
use tokio::sync::mpsc::UnboundedSender;

use crate::action::Action;
use crate::config::Config;
use crate::tui::Event;

/// Base trait for UI components and dialogs.
///
/// Components receive terminal events through `handle_events`, emit
/// [`Action`]s back to the app loop, and react to routed actions in
/// `update`. Everything has a default no-op so small dialogs only implement
/// what they use.
pub trait Component {
    /// Register an action handler that can send actions for processing if necessary.
    fn register_action_handler(&mut self, _tx: UnboundedSender<Action>) -> Result<()> {
        Ok(())
    }
    /// Register a configuration handler that provides configuration settings if necessary.
    fn register_config_handler(&mut self, _config: Config) -> Result<()> {
        Ok(())
    }
    /// Initialize the component with a specified area if necessary.
    fn init(&mut self, _area: Size) -> Result<()> {
        Ok(())
    }
    /// Handle incoming events and produce actions if necessary.
    fn handle_events(&mut self, event: Option<Event>) -> Result<Option<Action>> {
        let action = match event {
            Some(Event::Key(key_event)) => self.handle_key_event(key_event)?,
            Some(Event::Mouse(mouse_event)) => self.handle_mouse_event(mouse_event)?,
            _ => None,
        };
        Ok(action)
    }
    /// Handle key events and produce actions if necessary.
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }
    /// Handle mouse events and produce actions if necessary.
    fn handle_mouse_event(&mut self, _mouse: MouseEvent) -> Result<Option<Action>> {
        Ok(None)
    }
    /// Update the state of the component based on a received action.
    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }
    /// Render the component on the screen.
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}
