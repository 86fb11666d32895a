use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use crate::app::App;

/// Rows moved by PgUp/PgDn.
const PAGE: usize = 10;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.context_menu.is_some() {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => app.close_context_menu(),
            KeyCode::Up | KeyCode::Char('k') => app.menu_prev(),
            KeyCode::Down | KeyCode::Char('j') => app.menu_next(),
            KeyCode::Enter => app.menu_activate(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => app.select_prev_n(PAGE),
        KeyCode::PageDown => app.select_next_n(PAGE),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Tree expansion
        KeyCode::Char(' ') => app.toggle_selected(),
        KeyCode::Right | KeyCode::Char('l') => app.expand_selected(),
        KeyCode::Left | KeyCode::Char('h') => app.collapse_selected(),

        KeyCode::Char('m') => app.toggle_monitoring_selected(),
        KeyCode::Enter => app.open_context_menu(),
        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Char('e') => {
            let export_path = PathBuf::from("topicwatch_export.json");
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

/// Handle mouse events
///
/// `content_start_row` is the screen row of the table header; data rows
/// start one row below it.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, content_start_row: u16) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        MouseEventKind::Down(button @ (MouseButton::Left | MouseButton::Right)) => {
            if app.context_menu.is_some() {
                app.close_context_menu();
                return;
            }
            if mouse.row <= content_start_row {
                return;
            }
            let item_row = (mouse.row - content_start_row - 1) as usize;
            let row = item_row + app.table_state.offset();
            if row >= app.panel.tree().visible_rows().len() {
                return;
            }
            app.select_row(row);
            if button == MouseButton::Right {
                app.open_context_menu();
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::refresh::PanelOptions;
    use crate::data::{TopicPanel, TypeRegistry, TypeResolver};
    use crate::testing::FakeBus;
    use crate::ui::Theme;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};
    use std::sync::Arc;

    fn app() -> App {
        let mut types = TypeRegistry::new();
        types.add_definition("demo/Pair", "int32 a\nint32 b").unwrap();
        let bus = FakeBus::new();
        for topic in ["/x", "/y"] {
            bus.set_schema(topic, (*types.schema("demo/Pair").unwrap()).clone());
        }
        bus.publish([("/x", "demo/Pair"), ("/y", "demo/Pair")].into_iter().collect());
        let panel = TopicPanel::new(
            Box::new(bus.source()),
            Box::new(bus.factory()),
            Arc::new(types),
            PanelOptions::default(),
        );
        let mut app = App::new(panel, Theme::dark());
        app.panel.tick();
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn click(button: MouseButton, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(button),
            column: 4,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn keys_navigate_and_expand() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char(' ')));
        handle_key_event(&mut app, key(KeyCode::Down));
        assert_eq!(app.selected_path().as_deref(), Some("/x/a"));

        handle_key_event(&mut app, key(KeyCode::End));
        assert_eq!(app.selected_path().as_deref(), Some("/y"));
        handle_key_event(&mut app, key(KeyCode::PageUp));
        assert_eq!(app.selected_path().as_deref(), Some("/x"));
    }

    #[test]
    fn help_swallows_next_key() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn m_toggles_monitoring() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char('m')));
        assert!(app.panel.monitor("/x").unwrap().is_monitoring());
    }

    #[test]
    fn menu_keys() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(app.context_menu.is_some());
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.context_menu.is_none());
        assert!(app.running);
    }

    #[test]
    fn clicks_select_rows() {
        let mut app = app();
        handle_mouse_event(&mut app, click(MouseButton::Left, 4), 2);
        assert_eq!(app.selected_path().as_deref(), Some("/y"));

        // header rows and rows past the end are ignored
        handle_mouse_event(&mut app, click(MouseButton::Left, 2), 2);
        handle_mouse_event(&mut app, click(MouseButton::Left, 9), 2);
        assert_eq!(app.selected_path().as_deref(), Some("/y"));

        handle_mouse_event(&mut app, click(MouseButton::Right, 3), 2);
        assert_eq!(app.selected_path().as_deref(), Some("/x"));
        assert_eq!(app.context_menu.as_ref().unwrap().key.1, "/x");
    }

    #[test]
    fn q_quits() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
    }
}
