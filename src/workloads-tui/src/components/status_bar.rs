//! Bottom status bar component

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Span;
use ratatui::widgets::Paragraph;

use super::Component;
use crate::action::Action;
use crate::state::AppState;

/// Scope, table phase, last error and keybind hints.
pub struct StatusBar;

impl StatusBar {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatusBar {
    fn default() -> Self {
        Self::new()
    }
}

fn clock(ts: Option<std::time::SystemTime>) -> String {
    ts.map(|ts| {
        chrono::DateTime::<chrono::Local>::from(ts)
            .format("%H:%M:%S")
            .to_string()
    })
    .unwrap_or_else(|| "--:--:--".to_string())
}

impl Component for StatusBar {
    fn handle_key_event(&mut self, _key: KeyEvent) -> Option<Action> {
        None
    }

    fn update(&mut self, _action: &Action, _state: &mut AppState) {}

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let chunks = Layout::horizontal([
            Constraint::Percentage(45),
            Constraint::Percentage(20),
            Constraint::Percentage(35),
        ])
        .split(area);

        let scope = format!(
            "{} | cluster={} ns={}",
            state.datasource,
            if state.cluster.is_empty() {
                "*"
            } else {
                state.cluster.as_str()
            },
            state.namespace
        );
        let (left_text, color) = match &state.last_error {
            Some(err) => (
                format!("{scope} | [{}] {err}", clock(state.last_error_at)),
                Color::Red,
            ),
            None => (scope, Color::Green),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(left_text, Style::default().fg(color))),
            chunks[0],
        );

        let center = Paragraph::new(format!(
            "{} @ {}",
            state.table_phase,
            clock(state.last_refresh_at)
        ))
        .style(Style::default().fg(Color::White))
        .centered();
        frame.render_widget(center, chunks[1]);

        let right = Paragraph::new("q: Quit  r: Refresh  /: Search  n/p: Page")
            .style(Style::default().fg(Color::DarkGray))
            .right_aligned();
        frame.render_widget(right, chunks[2]);
    }
}
