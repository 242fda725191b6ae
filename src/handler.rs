use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, FocusPane, InputMode, Tab};
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
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Succeeded/Failed is shown until the user does something else
    app.processor.settle();

    match app.input_mode {
        InputMode::Editing => handle_editing(app, key),
        InputMode::Normal => match app.tab {
            Tab::Chat => handle_chat_normal(app, key),
            Tab::Samples => handle_samples(app, key),
            Tab::Setup => handle_setup(app, key),
        },
    }
}

/// Keys shared by every tab in normal mode. Returns true when consumed.
fn handle_global(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('1') if app.tab != Tab::Chat => app.tab = Tab::Chat,
        KeyCode::Char('2') if app.tab != Tab::Chat => app.tab = Tab::Samples,
        KeyCode::Char('3') if app.tab != Tab::Chat => app.tab = Tab::Setup,
        KeyCode::BackTab => {
            let next = (app.tab.index() + 1) % Tab::ALL.len();
            app.tab = Tab::ALL[next];
        }
        KeyCode::Esc => {
            app.banner = None;
            app.status = None;
        }
        _ => return false,
    }
    true
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if handle_global(app, key) {
        return;
    }

    match key.code {
        KeyCode::Char('i') | KeyCode::Char('/') => app.input_mode = InputMode::Editing,
        KeyCode::Tab => app.cycle_focus(),
        // Quick examples on the chat tab
        KeyCode::Char(c @ '1'..='6') => {
            if let Some(n) = c.to_digit(10) {
                app.ask_example(n as usize);
            }
        }
        KeyCode::Char('e') => {
            app.export_selected();
        }
        KeyCode::Char('C') => app.clear_history(),
        KeyCode::Char('R') => app.replay_history(),
        KeyCode::Char('G') => app.follow_chat = true,
        _ => match app.focus {
            FocusPane::Chat => match key.code {
                KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
                KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
                KeyCode::PageDown => {
                    for _ in 0..app.chat_height / 2 {
                        app.scroll_chat_down();
                    }
                }
                KeyCode::PageUp => {
                    for _ in 0..app.chat_height / 2 {
                        app.scroll_chat_up();
                    }
                }
                _ => {}
            },
            FocusPane::Results => match key.code {
                KeyCode::Char('l') | KeyCode::Right => app.next_result(),
                KeyCode::Char('h') | KeyCode::Left => app.prev_result(),
                KeyCode::Char('v') | KeyCode::Enter => app.cycle_view(),
                KeyCode::Char('j') | KeyCode::Down => {
                    app.result_scroll = app.result_scroll.saturating_add(1);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.result_scroll = app.result_scroll.saturating_sub(1);
                }
                _ => {}
            },
            FocusPane::Suggestions => match key.code {
                KeyCode::Char('j') | KeyCode::Down => app.suggestions_nav(true),
                KeyCode::Char('k') | KeyCode::Up => app.suggestions_nav(false),
                KeyCode::Enter => app.ask_selected_suggestion(),
                _ => {}
            },
        },
    }
}

fn handle_samples(app: &mut App, key: KeyEvent) {
    if handle_global(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.samples_nav(true),
        KeyCode::Char('k') | KeyCode::Up => app.samples_nav(false),
        KeyCode::Enter => app.ask_selected_sample(),
        KeyCode::Tab => app.tab = Tab::Setup,
        _ => {}
    }
}

fn handle_setup(app: &mut App, key: KeyEvent) {
    if handle_global(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('t') => app.run_check(),
        KeyCode::Tab => app.tab = Tab::Chat,
        _ => {}
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.tab = Tab::Samples;
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.cursor < app.input.chars().count() {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.cursor = app.cursor.saturating_sub(1),
        KeyCode::Right => app.cursor = (app.cursor + 1).min(app.input.chars().count()),
        KeyCode::Home => app.cursor = 0,
        KeyCode::End => app.cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}
