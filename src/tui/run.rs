//! TUI effects boundary: event loop, terminal lifecycle, key mapping.
//!
//! This is the only module with side effects. It wires the pure layers
//! (state, update, view) to the real terminal via crossterm and ratatui.
//!
//! A key reader thread forwards crossterm events into an mpsc channel;
//! the loop consumes them one at a time, so every dispatch and every
//! aggregation runs on this thread.

use std::io;
use std::sync::mpsc;
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};

use crate::navigation::NavigationTree;
use crate::store::Dataset;
use crate::views::ViewRegistry;

use super::state::{Action, App, AppEvent, Effect, Transition};
use super::update::{settle, update};
use super::view::render;

// ============================================================================
// KEY MAPPING
// ============================================================================

/// Map a crossterm key event to a semantic Action.
///
/// Returns None for keys that don't map to any action.
pub fn map_key(key: KeyEvent) -> Option<Action> {
    // Ctrl+C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::MoveRight),
        KeyCode::Tab => Some(Action::NextFocus),
        KeyCode::BackTab => Some(Action::PrevFocus),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    }
}

// ============================================================================
// TERMINAL LIFECYCLE
// ============================================================================

/// Set up the terminal for TUI mode.
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    Terminal::new(backend)
}

/// Restore the terminal to normal mode.
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Install a panic hook that restores the terminal before printing the panic.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

/// Spawn a thread that reads crossterm events and forwards them to the channel.
fn spawn_key_reader(tx: mpsc::Sender<AppEvent>) {
    thread::spawn(move || {
        loop {
            let event = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => AppEvent::Key(key),
                Ok(Event::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(event).is_err() {
                break; // receiver dropped, TUI is shutting down
            }
        }
    });
}

// ============================================================================
// EVENT LOOP
// ============================================================================

/// Run the dashboard until the user quits.
///
/// The data must already be loaded: nothing here can fail on input files.
pub fn run(data: Dataset<'_>, tree: &NavigationTree, registry: &ViewRegistry) -> io::Result<()> {
    install_panic_hook();
    let mut terminal = setup_terminal()?;
    let mut app = App::new(data, tree, registry);
    info!(path = ?app.page.path(), "dashboard started");

    let (tx, rx) = mpsc::channel::<AppEvent>();
    spawn_key_reader(tx);

    loop {
        terminal.draw(|frame| render(&app, frame))?;

        if app.should_quit {
            break;
        }

        let event = match rx.recv() {
            Ok(e) => e,
            Err(_) => break, // reader thread gone
        };

        let AppEvent::Key(key) = event else {
            continue; // resize: just redraw
        };
        let Some(action) = map_key(key) else {
            continue;
        };

        match update(app.focus, &action, &app.page) {
            Transition::Focus(focus) => app.focus = focus,
            Transition::Quit => app.should_quit = true,
            Transition::Effect(effect) => handle_effect(effect, &mut app),
        }
    }

    restore_terminal()?;
    info!("dashboard closed");
    Ok(())
}

// ============================================================================
// EFFECT HANDLING
// ============================================================================

/// Apply a selection change, rebuild the page, and re-home the focus.
///
/// A rejected selection leaves the page as it was and shows the reason
/// in the status line.
fn handle_effect(effect: Effect, app: &mut App) {
    let outcome = match &effect {
        Effect::SelectMenu { level, label } => app
            .dispatcher
            .select(&mut app.selections, *level, label)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Effect::SetInput { view, key, value } => app
            .set_input(*view, *key, value)
            .map_err(|e| e.to_string()),
    };

    match outcome {
        Ok(()) => {
            app.status = None;
            app.refresh();
        }
        Err(message) => {
            warn!(?effect, %message, "selection rejected");
            app.status = Some(message);
        }
    }
    app.focus = settle(app.focus, &app.page);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::state::Focus;
    use crate::types::{GeoCode, GeoLocation, Record, SelectorKey, Table, ViewId, Year};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn ctrl_c_maps_to_quit() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(key), Some(Action::Quit));
    }

    #[test]
    fn vim_keys_map_to_movement() {
        assert_eq!(map_key(key(KeyCode::Char('j'))), Some(Action::MoveDown));
        assert_eq!(map_key(key(KeyCode::Char('k'))), Some(Action::MoveUp));
        assert_eq!(map_key(key(KeyCode::Char('h'))), Some(Action::MoveLeft));
        assert_eq!(map_key(key(KeyCode::Char('l'))), Some(Action::MoveRight));
    }

    #[test]
    fn arrow_keys_map_to_movement() {
        assert_eq!(map_key(key(KeyCode::Up)), Some(Action::MoveUp));
        assert_eq!(map_key(key(KeyCode::Down)), Some(Action::MoveDown));
        assert_eq!(map_key(key(KeyCode::Left)), Some(Action::MoveLeft));
        assert_eq!(map_key(key(KeyCode::Right)), Some(Action::MoveRight));
    }

    #[test]
    fn tab_keys_cycle_focus() {
        assert_eq!(map_key(key(KeyCode::Tab)), Some(Action::NextFocus));
        let back_tab = KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(map_key(back_tab), Some(Action::PrevFocus));
    }

    #[test]
    fn enter_esc_and_q() {
        assert_eq!(map_key(key(KeyCode::Enter)), Some(Action::Enter));
        assert_eq!(map_key(key(KeyCode::Esc)), Some(Action::Back));
        assert_eq!(map_key(key(KeyCode::Char('q'))), Some(Action::Quit));
    }

    #[test]
    fn unmapped_key_returns_none() {
        assert_eq!(map_key(key(KeyCode::Char('z'))), None);
    }

    fn tables() -> (Table<Record>, Table<GeoLocation>) {
        let record = |ubigeo, period, dep: &str, mun: f64| Record {
            ubigeo: GeoCode(ubigeo),
            period: Year(period),
            department: dep.into(),
            province: dep.into(),
            district: dep.into(),
            domestic_waste: mun,
            non_domestic_waste: 0.0,
            municipal_waste: mun,
            per_capita_domestic: 0.0,
        };
        (
            Table::new(vec![
                record(150101, 2014, "LIMA", 10.0),
                record(80101, 2015, "CUSCO", 5.0),
            ]),
            Table::new(vec![]),
        )
    }

    #[test]
    fn selecting_a_menu_rebuilds_the_page() {
        let (records, geo) = tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let mut app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);

        app.focus = Focus::Menu { level: 0, cursor: 2 };
        handle_effect(
            Effect::SelectMenu {
                level: 0,
                label: "Nosotros".into(),
            },
            &mut app,
        );
        assert_eq!(app.page.path(), ["Nosotros", "¿Quiénes somos?"]);
        assert_eq!(app.page.views[0].id, ViewId::Team);
        assert_eq!(app.focus, Focus::Menu { level: 0, cursor: 2 });
        assert_eq!(app.status, None);
    }

    #[test]
    fn rejected_selection_sets_status_and_keeps_page() {
        let (records, geo) = tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let mut app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);
        let before = app.page.clone();

        handle_effect(
            Effect::SelectMenu {
                level: 1,
                label: "Gráfico 9".into(),
            },
            &mut app,
        );
        assert_eq!(app.page, before);
        assert!(app.status.as_deref().unwrap().contains("Gráfico 9"));
    }

    #[test]
    fn selector_change_reruns_the_view() {
        let (records, geo) = tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let mut app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);
        handle_effect(
            Effect::SelectMenu {
                level: 1,
                label: "Gráfico 3".into(),
            },
            &mut app,
        );

        app.focus = Focus::Selector {
            view: 0,
            index: 0,
            cursor: 1,
        };
        handle_effect(
            Effect::SetInput {
                view: ViewId::PeriodDepartmentLine,
                key: SelectorKey::Period,
                value: "2015".into(),
            },
            &mut app,
        );
        let selector = app.page.selector(0, 0).unwrap();
        assert_eq!(selector.selected_label(), Some("2015"));
        assert_eq!(
            app.focus,
            Focus::Selector {
                view: 0,
                index: 0,
                cursor: 1
            }
        );
    }
}
