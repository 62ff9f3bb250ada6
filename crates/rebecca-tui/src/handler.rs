use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Stream(event) => app.apply_stream_event(event),
        AppEvent::HistoryLoaded(result) => app.history_loaded(result),
        AppEvent::LoginFinished(result) => app.finish_login(result),
        AppEvent::RegisterFinished { username, result } => app.finish_register(username, result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.screen {
        Screen::Login | Screen::Register => handle_form_key(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }

    Ok(())
}

fn handle_form_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if app.screen == Screen::Register {
                app.form_message = None;
                app.show_login();
            } else {
                app.should_quit = true;
            }
        }

        // Switch to the registration form
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if app.screen == Screen::Login {
                app.show_register();
            }
        }

        KeyCode::Tab | KeyCode::Down => app.next_form_field(),
        KeyCode::BackTab | KeyCode::Up => app.prev_form_field(),

        KeyCode::Enter => {
            if !app.on_last_form_field() {
                app.next_form_field();
            } else if app.screen == Screen::Register {
                app.submit_register();
            } else {
                app.submit_login();
            }
        }

        KeyCode::Backspace => {
            if let Some(field) = app.form_field_mut() {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(field) = app.form_field_mut() {
                field.push(c);
            }
        }
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Tab cycles: History -> Transcript -> Input -> History
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::History => FocusPane::Transcript,
                FocusPane::Transcript => FocusPane::Input,
                FocusPane::Input => FocusPane::History,
            };

            // Auto-enter editing mode when focusing input
            if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
                app.input_cursor = app.session.input.chars().count();
            }
        }

        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.session.input.chars().count();
        }

        KeyCode::Enter => match app.focus {
            FocusPane::History => app.reuse_selected_prompt(),
            _ => {
                app.focus = FocusPane::Input;
                app.input_mode = InputMode::Editing;
            }
        },

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::History => app.history_nav_down(),
            _ => app.scroll_chat_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::History => app.history_nav_up(),
            _ => app.scroll_chat_up(1),
        },

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_down((app.chat_height / 2).max(1));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_up((app.chat_height / 2).max(1));
        }

        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('S') => app.toggle_speech(),
        KeyCode::Char('L') => app.logout(),

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Transcript;
        }
        KeyCode::Enter => app.send_message(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.session.input, app.input_cursor);
                app.session.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.session.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.session.input, app.input_cursor);
                app.session.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.session.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.session.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.session.input, app.input_cursor);
            app.session.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }

    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling
    let in_history = app.history_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_history {
                app.history_nav_down();
            } else if in_chat {
                app.scroll_chat_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_history {
                app.history_nav_up();
            } else if in_chat {
                app.scroll_chat_up(3);
            }
        }
        _ => {}
    }
}
