//! Actions that drive TUI state transitions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    SwitchTab(usize),
    NextTab,
    PrevTab,
    Refresh,
    ScrollUp,
    ScrollDown,
    NextPage,
    PrevPage,
    /// Toggle the expanded view of the selected row
    Select,
    Back,
    /// Start editing the search filter
    Search,
    None,
}

/// Map a key event to an [`Action`].
pub fn map_key_to_action(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('1') => Action::SwitchTab(0),
        KeyCode::Char('2') => Action::SwitchTab(1),
        KeyCode::Char('3') => Action::SwitchTab(2),
        KeyCode::Tab => Action::NextTab,
        KeyCode::BackTab => Action::PrevTab,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp,
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown,
        KeyCode::Right | KeyCode::PageDown | KeyCode::Char('n') => Action::NextPage,
        KeyCode::Left | KeyCode::PageUp | KeyCode::Char('p') => Action::PrevPage,
        KeyCode::Enter => Action::Select,
        KeyCode::Esc => Action::Back,
        KeyCode::Char('/') => Action::Search,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn quit_keys() {
        assert_eq!(map_key_to_action(press(KeyCode::Char('q'))), Action::Quit);
        let ctrl_c = KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..press(KeyCode::Char('c'))
        };
        assert_eq!(map_key_to_action(ctrl_c), Action::Quit);
    }

    #[test]
    fn number_keys_map_to_switch_tab() {
        for (ch, idx) in [('1', 0), ('2', 1), ('3', 2)] {
            assert_eq!(
                map_key_to_action(press(KeyCode::Char(ch))),
                Action::SwitchTab(idx)
            );
        }
        assert_eq!(map_key_to_action(press(KeyCode::Char('4'))), Action::None);
    }

    #[test]
    fn paging_keys() {
        for code in [KeyCode::Right, KeyCode::PageDown, KeyCode::Char('n')] {
            assert_eq!(map_key_to_action(press(code)), Action::NextPage);
        }
        for code in [KeyCode::Left, KeyCode::PageUp, KeyCode::Char('p')] {
            assert_eq!(map_key_to_action(press(code)), Action::PrevPage);
        }
    }

    #[test]
    fn navigation_keys() {
        assert_eq!(map_key_to_action(press(KeyCode::Up)), Action::ScrollUp);
        assert_eq!(map_key_to_action(press(KeyCode::Char('j'))), Action::ScrollDown);
        assert_eq!(map_key_to_action(press(KeyCode::Enter)), Action::Select);
        assert_eq!(map_key_to_action(press(KeyCode::Esc)), Action::Back);
        assert_eq!(map_key_to_action(press(KeyCode::Char('/'))), Action::Search);
        assert_eq!(map_key_to_action(press(KeyCode::Char('r'))), Action::Refresh);
    }

    #[test]
    fn unknown_key_maps_to_none() {
        assert_eq!(map_key_to_action(press(KeyCode::Char('z'))), Action::None);
    }
}
