//! Tab bar component

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Tabs as RatatuiTabs};

use super::Component;
use crate::action::Action;
use crate::state::AppState;

/// Top-of-screen tab bar with keyboard shortcuts.
pub struct TabBar;

impl TabBar {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TabBar {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for TabBar {
    fn handle_key_event(&mut self, _key: KeyEvent) -> Option<Action> {
        None
    }

    fn update(&mut self, _action: &Action, _state: &mut AppState) {}

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let titles: Vec<Line<'_>> = state
            .available_tabs
            .iter()
            .map(|tab| Line::from(format!("[{}] {}", tab.shortcut(), tab.label())))
            .collect();

        let tabs = RatatuiTabs::new(titles)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Kubernetes Workloads"),
            )
            .select(state.active_index())
            .style(Style::default().fg(Color::White))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .divider("|");

        frame.render_widget(tabs, area);
    }
}
