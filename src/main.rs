use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod apps;
mod config;
mod home;
mod prefs;
mod screensaver;
mod settings;
mod status;
mod ui;
mod weather;

use home::{HomeAction, HomeViewModel};
use prefs::PrefStore;
use screensaver::{KeyOutcome, OverlayState, ScreensaverController};
use settings::{SettingsAction, SettingsScreen};
use ui::Term;

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn init_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(ratatui::Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

// ── Main application loop ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Settings,
}

fn run(terminal: &mut Term) -> Result<()> {
    let store = Arc::new(PrefStore::open(config::preferences_file()));

    // Background inputs: preference stream, app scans, install/uninstall
    // signals, weather refreshes. All land on the UI loop via channels.
    let prefs_rx = store.subscribe();
    let (scan_tx, scan_rx) = channel();
    home::spawn_scan(scan_tx.clone());
    let apps_changed_rx = apps::spawn_change_watcher();
    let (weather_rx, _weather_handle) = home::spawn_weather_worker(store.clone());

    let mut home_vm = HomeViewModel::new(store.clone());
    let mut settings_screen = SettingsScreen::new(store.clone());
    let mut saver = ScreensaverController::new(Instant::now(), &store.read());
    let mut overlay = OverlayState::new();
    let mut screen = Screen::Home;

    loop {
        while let Ok(prefs) = prefs_rx.try_recv() {
            home_vm.set_prefs(prefs);
        }
        while let Ok(apps) = scan_rx.try_recv() {
            home_vm.set_apps(apps);
        }
        while apps_changed_rx.try_recv().is_ok() {
            home::spawn_scan(scan_tx.clone());
        }
        while let Ok(weather) = weather_rx.try_recv() {
            home_vm.set_weather(weather);
        }

        let saver_active = saver.poll(Instant::now());
        let saver_type = home_vm.prefs().screensaver_type;

        terminal.draw(|f| {
            if saver_active {
                overlay.render(f, saver_type);
            } else {
                match screen {
                    Screen::Home => home_vm.render(f),
                    Screen::Settings => settings_screen.render(f, home_vm.all_apps()),
                }
            }
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // Every key-down goes through the screensaver first; a key
                // that wakes it never reaches the screens below.
                if saver.on_key(Instant::now(), home_vm.prefs()) == KeyOutcome::Consumed {
                    continue;
                }
                match screen {
                    Screen::Home => match home_vm.handle_key(key.code) {
                        HomeAction::OpenSettings => screen = Screen::Settings,
                        HomeAction::Rescan => home::spawn_scan(scan_tx.clone()),
                        HomeAction::Quit => break,
                        HomeAction::None => {}
                    },
                    Screen::Settings => {
                        if settings_screen.handle_key(key.code, home_vm.all_apps())
                            == SettingsAction::Back
                        {
                            screen = Screen::Home;
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let mut terminal = init_terminal()?;

    let result =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(&mut terminal)));

    // Always restore the terminal, even on a crash.
    restore_terminal(&mut terminal).ok();

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            eprintln!("cleartv crashed; the terminal has been restored.");
            Ok(())
        }
    }
}
