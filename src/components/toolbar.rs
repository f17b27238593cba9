//! Toolbar line under the event table.
//!
//! Button kinds are a closed enum with one exhaustive dispatch to [`Action`];
//! adding a button means adding a variant, not registering a factory.

use color_eyre::Result;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::action::Action;
use crate::components::Component;

/// Every button the toolbar can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarButton {
    Search,
    AdvancedSearch,
    ClearFilters,
    Refresh,
    Quit,
}

impl ToolbarButton {
    pub fn label(self) -> &'static str {
        match self {
            ToolbarButton::Search => "חיפוש",
            ToolbarButton::AdvancedSearch => "חיפוש מתקדם",
            ToolbarButton::ClearFilters => "ניקוי סינון",
            ToolbarButton::Refresh => "רענון",
            ToolbarButton::Quit => "יציאה",
        }
    }

    pub fn action(self) -> Action {
        match self {
            ToolbarButton::Search => Action::StartSearch,
            ToolbarButton::AdvancedSearch => Action::OpenQueryBuilder,
            ToolbarButton::ClearFilters => Action::ClearSearch,
            ToolbarButton::Refresh => Action::Refresh,
            ToolbarButton::Quit => Action::Quit,
        }
    }
}

/// The toolbar itself: a fixed button row with one highlighted entry.
#[derive(Debug, Clone)]
pub struct Toolbar {
    buttons: Vec<ToolbarButton>,
    selected: usize,
}

impl Default for Toolbar {
    fn default() -> Self {
        Self {
            buttons: vec![
                ToolbarButton::Search,
                ToolbarButton::AdvancedSearch,
                ToolbarButton::ClearFilters,
                ToolbarButton::Refresh,
                ToolbarButton::Quit,
            ],
            selected: 0,
        }
    }
}

impl Toolbar {
    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.buttons.len();
    }

    pub fn select_prev(&mut self) {
        if self.selected == 0 {
            self.selected = self.buttons.len() - 1;
        } else {
            self.selected -= 1;
        }
    }

    /// Action of the highlighted button.
    pub fn selected_action(&self) -> Action {
        self.buttons[self.selected].action()
    }
}

impl Component for Toolbar {
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let mut spans: Vec<Span> = Vec::with_capacity(self.buttons.len() * 2);
        for (i, button) in self.buttons.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            let style = if i == self.selected {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            spans.push(Span::styled(format!("[ {} ]", button.label()), style));
        }
        let paragraph =
            Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::TOP));
        frame.render_widget(paragraph, area);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_button_dispatch_is_exhaustive() {
        let all = [
            ToolbarButton::Search,
            ToolbarButton::AdvancedSearch,
            ToolbarButton::ClearFilters,
            ToolbarButton::Refresh,
            ToolbarButton::Quit,
        ];
        for button in all {
            assert!(!button.label().is_empty());
        }
        assert_eq!(ToolbarButton::AdvancedSearch.action(), Action::OpenQueryBuilder);
        assert_eq!(ToolbarButton::Quit.action(), Action::Quit);
    }

    #[test]
    fn test_selection_wraps() {
        let mut toolbar = Toolbar::default();
        assert_eq!(toolbar.selected_action(), Action::StartSearch);
        toolbar.select_prev();
        assert_eq!(toolbar.selected_action(), Action::Quit);
        toolbar.select_next();
        assert_eq!(toolbar.selected_action(), Action::StartSearch);
    }
}
