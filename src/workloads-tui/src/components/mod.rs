//! Component trait and implementations

pub mod expanded_row;
pub mod status_bar;
pub mod tabs;
pub mod workload_table;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::action::Action;
use crate::state::AppState;

/// Lifecycle trait for TUI components.
///
/// The [`App`](crate::app::App) delegates key handling, state updates and
/// rendering to its components through this trait.
pub trait Component {
    /// Consume a key press before it is mapped to a global [`Action`].
    /// `None` lets the app map it.
    fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action>;

    /// React to an action that was dispatched globally.
    fn update(&mut self, action: &Action, state: &mut AppState);

    /// Draw the component into the given area.
    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState);
}
