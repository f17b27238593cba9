//! Terminal event type routed through [`Component::handle_events`].
//!
//! [`Component::handle_events`]: crate::components::Component::handle_events

use crossterm::event::{KeyEvent, MouseEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
}
