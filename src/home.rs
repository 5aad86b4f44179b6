use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use crossterm::event::KeyCode;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::apps::{self, AppInfo};
use crate::config::UserPreferences;
use crate::prefs::PrefStore;
use crate::status::render_top_bar;
use crate::ui::{pad_horizontal, Palette};
use crate::weather::{WeatherClient, WeatherData};

/// Pre-seeded favourites row shown until the user pins something: the usual
/// streaming suspects, resolved against whatever is actually installed.
const DEFAULT_FAVOURITE_IDS: &[&str] = &[
    "tv.kodi.Kodi",
    "org.jellyfin.JellyfinMediaPlayer",
    "com.plexapp.PlexDesktop",
    "com.spotify.Client",
];

/// Fallback coordinates when no location is configured or geocoding fails.
const DEFAULT_LOCATION: (f64, f64, &str) = (51.5074, -0.1278, "London");

const WEATHER_REFRESH: Duration = Duration::from_secs(30 * 60);

const GRID_COLS: usize = 5;
const TILE_WIDTH: usize = 20;

// ── Weather worker ────────────────────────────────────────────────────────────

/// Keeps the worker alive; dropping it wakes and stops the thread.
pub struct WeatherHandle {
    _shutdown: Sender<()>,
}

/// One long-lived background task: fetch on start and every 30 minutes
/// while the weather widget is enabled. Failures are dropped on the floor —
/// the UI keeps showing the previous data until the next cycle.
pub fn spawn_weather_worker(store: Arc<PrefStore>) -> (Receiver<WeatherData>, WeatherHandle) {
    let (data_tx, data_rx) = channel();
    let (shutdown_tx, shutdown_rx) = channel::<()>();
    std::thread::spawn(move || {
        // No HTTP client means no weather; the rest of the UI is unaffected.
        let Ok(client) = WeatherClient::new() else {
            return;
        };
        loop {
            let prefs = store.read();
            if prefs.show_weather {
                if let Some(data) = fetch_once(&client, &prefs) {
                    if data_tx.send(data).is_err() {
                        break;
                    }
                }
            }
            match shutdown_rx.recv_timeout(WEATHER_REFRESH) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
    });
    (
        data_rx,
        WeatherHandle {
            _shutdown: shutdown_tx,
        },
    )
}

fn fetch_once(client: &WeatherClient, prefs: &UserPreferences) -> Option<WeatherData> {
    let (lat, lon, name) = if prefs.weather_location.is_empty() {
        let (lat, lon, name) = DEFAULT_LOCATION;
        (lat, lon, name.to_string())
    } else {
        match client.geocode(&prefs.weather_location) {
            Ok(geo) => (geo.latitude, geo.longitude, geo.name),
            Err(_) => {
                let (lat, lon, name) = DEFAULT_LOCATION;
                (lat, lon, name.to_string())
            }
        }
    };
    match client.fetch_weather(lat, lon, prefs.weather_celsius) {
        Ok(mut data) => {
            data.location_name = name;
            Some(data)
        }
        Err(_) => None,
    }
}

// ── App scan ──────────────────────────────────────────────────────────────────

/// One-shot background scan; the result lands on the channel.
pub fn spawn_scan(tx: Sender<Vec<AppInfo>>) {
    std::thread::spawn(move || {
        let _ = tx.send(apps::list_launchable_apps());
    });
}

// ── Projections ───────────────────────────────────────────────────────────────

/// Apps eligible for the grid: not hidden, and Settings/System utilities
/// only when the preference allows them. Ordinary apps are always eligible,
/// regardless of where they are installed.
pub fn visible_apps<'a>(all: &'a [AppInfo], prefs: &UserPreferences) -> Vec<&'a AppInfo> {
    all.iter()
        .filter(|a| !prefs.hidden_packages.iter().any(|h| h == &a.app_id))
        .filter(|a| prefs.show_system_apps || !a.is_system)
        .collect()
}

/// The favourites row. Stored ids resolve in stored order, dropping any no
/// longer installed; an empty list falls back to well-known streaming apps,
/// or the first four installed apps when none of those are present.
pub fn favourites<'a>(all: &'a [AppInfo], prefs: &UserPreferences) -> Vec<&'a AppInfo> {
    if prefs.favourite_packages.is_empty() {
        let defaults: Vec<&AppInfo> = DEFAULT_FAVOURITE_IDS
            .iter()
            .filter_map(|id| all.iter().find(|a| a.app_id == *id))
            .collect();
        if defaults.is_empty() {
            all.iter().take(4).collect()
        } else {
            defaults
        }
    } else {
        prefs
            .favourite_packages
            .iter()
            .filter_map(|id| all.iter().find(|a| a.app_id == *id))
            .collect()
    }
}

// ── View-model ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Favourites(usize),
    Grid(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeAction {
    None,
    OpenSettings,
    Rescan,
    Quit,
}

const CONTEXT_ITEMS: usize = 3; // pin/unpin, hide, cancel

pub struct HomeViewModel {
    store: Arc<PrefStore>,
    prefs: UserPreferences,
    all_apps: Vec<AppInfo>,
    loading: bool,
    weather: Option<WeatherData>,
    focus: Focus,
    context_menu: Option<AppInfo>,
    context_sel: usize,
}

impl HomeViewModel {
    pub fn new(store: Arc<PrefStore>) -> Self {
        let prefs = store.read();
        Self {
            store,
            prefs,
            all_apps: Vec::new(),
            loading: true,
            weather: None,
            focus: Focus::Favourites(0),
            context_menu: None,
            context_sel: 0,
        }
    }

    pub fn prefs(&self) -> &UserPreferences {
        &self.prefs
    }

    pub fn all_apps(&self) -> &[AppInfo] {
        &self.all_apps
    }

    pub fn set_prefs(&mut self, prefs: UserPreferences) {
        self.prefs = prefs;
    }

    pub fn set_apps(&mut self, apps: Vec<AppInfo>) {
        self.all_apps = apps;
        self.loading = false;
    }

    pub fn set_weather(&mut self, weather: WeatherData) {
        // Replaced wholesale on every successful fetch.
        self.weather = Some(weather);
    }

    fn focused_app(&self) -> Option<&AppInfo> {
        match self.focus {
            Focus::Favourites(i) => favourites(&self.all_apps, &self.prefs).get(i).copied(),
            Focus::Grid(i) => visible_apps(&self.all_apps, &self.prefs).get(i).copied(),
        }
    }

    // ── Input ────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, code: KeyCode) -> HomeAction {
        if self.context_menu.is_some() {
            self.handle_context_key(code);
            return HomeAction::None;
        }
        match code {
            KeyCode::Left => self.move_horizontal(-1),
            KeyCode::Right => self.move_horizontal(1),
            KeyCode::Up => self.move_vertical(-1),
            KeyCode::Down => self.move_vertical(1),
            KeyCode::Enter => {
                if let Some(app) = self.focused_app() {
                    apps::launch(app);
                }
            }
            KeyCode::Char('m') => {
                if let Some(app) = self.focused_app().cloned() {
                    self.context_menu = Some(app);
                    self.context_sel = 0;
                }
            }
            KeyCode::Char('s') => return HomeAction::OpenSettings,
            KeyCode::Char('r') => return HomeAction::Rescan,
            KeyCode::Char('q') => return HomeAction::Quit,
            _ => {}
        }
        HomeAction::None
    }

    fn handle_context_key(&mut self, code: KeyCode) {
        let Some(app) = self.context_menu.clone() else {
            return;
        };
        match code {
            KeyCode::Up => self.context_sel = self.context_sel.saturating_sub(1),
            KeyCode::Down => self.context_sel = (self.context_sel + 1).min(CONTEXT_ITEMS - 1),
            KeyCode::Esc => self.context_menu = None,
            KeyCode::Enter => {
                match self.context_sel {
                    0 => self.store.toggle_favourite(&app.app_id),
                    1 => self.store.hide_app(&app.app_id),
                    _ => {}
                }
                self.context_menu = None;
            }
            _ => {}
        }
    }

    fn move_horizontal(&mut self, delta: isize) {
        let wrap = self.prefs.wrap_focus;
        match self.focus {
            Focus::Favourites(i) => {
                let len = favourites(&self.all_apps, &self.prefs).len();
                self.focus = Focus::Favourites(step(i, delta, len, wrap));
            }
            Focus::Grid(i) => {
                let len = visible_apps(&self.all_apps, &self.prefs).len();
                if len == 0 {
                    return;
                }
                // Wrapping stays within the current row. The list may have
                // shrunk under the cursor since the last scan.
                let i = i.min(len - 1);
                let row = i / GRID_COLS;
                let row_len = len.saturating_sub(row * GRID_COLS).min(GRID_COLS);
                let col = step(i % GRID_COLS, delta, row_len, wrap);
                self.focus = Focus::Grid(row * GRID_COLS + col);
            }
        }
    }

    fn move_vertical(&mut self, delta: isize) {
        let grid_len = visible_apps(&self.all_apps, &self.prefs).len();
        let fav_len = favourites(&self.all_apps, &self.prefs).len();
        self.focus = match (self.focus, delta) {
            (Focus::Favourites(i), 1) if grid_len > 0 => Focus::Grid(i.min(grid_len - 1)),
            (Focus::Grid(i), -1) if i < GRID_COLS => {
                if fav_len > 0 {
                    Focus::Favourites((i % GRID_COLS).min(fav_len - 1))
                } else {
                    Focus::Grid(i)
                }
            }
            (Focus::Grid(i), -1) => Focus::Grid(i - GRID_COLS),
            (Focus::Grid(i), 1) if i + GRID_COLS < grid_len => Focus::Grid(i + GRID_COLS),
            (Focus::Grid(i), 1) if grid_len > 0 => Focus::Grid(grid_len - 1),
            (focus, _) => focus,
        };
    }

    // ── Rendering ────────────────────────────────────────────────────────────

    pub fn render(&self, f: &mut Frame) {
        let palette = Palette::from_prefs(&self.prefs);
        let area = f.area();
        f.render_widget(Paragraph::new("").style(palette.normal()), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // top bar
                Constraint::Length(1),
                Constraint::Length(1), // favourites title
                Constraint::Length(1), // favourites row
                Constraint::Length(1),
                Constraint::Length(1), // grid title
                Constraint::Min(1),    // grid
                Constraint::Length(1), // hint
            ])
            .split(area);

        render_top_bar(f, chunks[0], &self.prefs, self.weather.as_ref(), &palette);

        if self.loading {
            let p = Paragraph::new("Scanning applications…")
                .alignment(Alignment::Center)
                .style(palette.dim());
            f.render_widget(p, chunks[6]);
            return;
        }

        let favs = favourites(&self.all_apps, &self.prefs);
        let fav_sel = match self.focus {
            Focus::Favourites(i) => Some(i),
            _ => None,
        };
        f.render_widget(
            Paragraph::new("Favourites").style(palette.title()),
            pad_horizontal(chunks[2]),
        );
        f.render_widget(
            Paragraph::new(tile_row(&favs, fav_sel, &palette)),
            pad_horizontal(chunks[3]),
        );

        let visible = visible_apps(&self.all_apps, &self.prefs);
        f.render_widget(
            Paragraph::new(format!("All Apps ({})", visible.len())).style(palette.title()),
            pad_horizontal(chunks[5]),
        );
        let grid_sel = match self.focus {
            Focus::Grid(i) => Some(i),
            _ => None,
        };
        self.render_grid(f, pad_horizontal(chunks[6]), &visible, grid_sel, &palette);

        let hint = Paragraph::new("←↑↓→ navigate   Enter launch   m menu   s settings   q quit")
            .style(palette.dim());
        f.render_widget(hint, pad_horizontal(chunks[7]));

        if let Some(app) = &self.context_menu {
            self.render_context_menu(f, area, app, &palette);
        }
    }

    fn render_grid(
        &self,
        f: &mut Frame,
        area: Rect,
        visible: &[&AppInfo],
        selected: Option<usize>,
        palette: &Palette,
    ) {
        let mut lines: Vec<Line> = Vec::new();
        for (row_idx, row) in visible.chunks(GRID_COLS).enumerate() {
            let mut spans: Vec<Span> = Vec::new();
            for (col_idx, app) in row.iter().enumerate() {
                let idx = row_idx * GRID_COLS + col_idx;
                let style = if selected == Some(idx) {
                    palette.selected()
                } else {
                    palette.normal()
                };
                spans.push(Span::styled(tile_label(app), style));
                spans.push(Span::styled("  ", palette.normal()));
            }
            lines.push(Line::from(spans));
            lines.push(Line::from(""));
        }
        // Keep the focused row on screen.
        let visible_rows = (area.height / 2).max(1) as usize;
        let focus_row = selected.map_or(0, |i| i / GRID_COLS);
        let first = focus_row.saturating_sub(visible_rows - 1);
        let shown: Vec<Line> = lines.into_iter().skip(first * 2).collect();
        f.render_widget(Paragraph::new(shown), area);
    }

    fn render_context_menu(&self, f: &mut Frame, area: Rect, app: &AppInfo, palette: &Palette) {
        let is_fav = self
            .prefs
            .favourite_packages
            .iter()
            .any(|p| p == &app.app_id);
        let items = [
            if is_fav { "★ Unpin" } else { "☆ Pin" },
            "⊘ Hide",
            "Cancel",
        ];

        let w = 30u16.min(area.width);
        let h = (items.len() as u16 + 4).min(area.height);
        let rect = Rect::new(
            area.width.saturating_sub(w) / 2,
            area.height.saturating_sub(h) / 2,
            w,
            h,
        );
        f.render_widget(Clear, rect);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(palette.title())
            .title(Span::styled(app.label.clone(), palette.title()))
            .style(palette.normal());
        let inner = block.inner(rect);
        f.render_widget(block, rect);

        let lines: Vec<Line> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let style = if i == self.context_sel {
                    palette.selected()
                } else {
                    palette.normal()
                };
                Line::from(Span::styled(format!("  {item}  "), style))
            })
            .collect();
        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
    }
}

fn tile_label(app: &AppInfo) -> String {
    let mut label = app.label.clone();
    if label.chars().count() > TILE_WIDTH - 4 {
        label = label.chars().take(TILE_WIDTH - 5).collect::<String>() + "…";
    }
    format!("[ {label} ]")
}

fn tile_row<'a>(apps: &[&AppInfo], selected: Option<usize>, palette: &Palette) -> Line<'a> {
    let mut spans: Vec<Span> = Vec::new();
    for (i, app) in apps.iter().enumerate() {
        let style = if selected == Some(i) {
            palette.selected()
        } else {
            palette.normal()
        };
        spans.push(Span::styled(tile_label(app), style));
        spans.push(Span::styled("  ", palette.normal()));
    }
    if spans.is_empty() {
        spans.push(Span::styled("(no apps installed)", palette.dim()));
    }
    Line::from(spans)
}

fn step(i: usize, delta: isize, len: usize, wrap: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let next = i as isize + delta;
    if wrap {
        next.rem_euclid(len as isize) as usize
    } else {
        next.clamp(0, len as isize - 1) as usize
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, label: &str, system: bool) -> AppInfo {
        AppInfo {
            app_id: id.to_string(),
            label: label.to_string(),
            exec: label.to_lowercase(),
            icon: String::new(),
            is_system: system,
        }
    }

    fn installed() -> Vec<AppInfo> {
        vec![
            app("tv.kodi.Kodi", "Kodi", false),
            app("com.spotify.Client", "Spotify", false),
            app("org.gnome.Settings", "Settings", true),
            app("org.videolan.VLC", "VLC", false),
            app("com.example.game", "Game", false),
        ]
    }

    #[test]
    fn visible_apps_excludes_hidden_packages() {
        let all = installed();
        let prefs = UserPreferences {
            hidden_packages: vec!["org.videolan.VLC".into()],
            show_system_apps: true,
            ..UserPreferences::default()
        };
        let visible = visible_apps(&all, &prefs);
        assert!(!visible.iter().any(|a| a.app_id == "org.videolan.VLC"));
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn visible_apps_hides_system_utilities_by_default() {
        let all = installed();
        let prefs = UserPreferences::default();
        assert!(!visible_apps(&all, &prefs)
            .iter()
            .any(|a| a.app_id == "org.gnome.Settings"));
    }

    #[test]
    fn ordinary_apps_are_visible_with_default_preferences() {
        let all = installed();
        let prefs = UserPreferences::default();
        // Only the one system utility is held back; a fresh grid is full.
        assert_eq!(visible_apps(&all, &prefs).len(), 4);
    }

    #[test]
    fn favourites_fallback_picks_known_streaming_apps() {
        let all = installed();
        let prefs = UserPreferences::default();
        let favs = favourites(&all, &prefs);
        let ids: Vec<&str> = favs.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, vec!["tv.kodi.Kodi", "com.spotify.Client"]);
    }

    #[test]
    fn favourites_fallback_takes_first_four_when_nothing_known() {
        let all = vec![
            app("a", "A", false),
            app("b", "B", false),
            app("c", "C", false),
            app("d", "D", false),
            app("e", "E", false),
        ];
        let prefs = UserPreferences::default();
        let favs = favourites(&all, &prefs);
        assert_eq!(favs.len(), 4);
        assert_eq!(favs[0].app_id, "a");
    }

    #[test]
    fn stored_favourites_resolve_in_order_and_drop_uninstalled() {
        let all = installed();
        let prefs = UserPreferences {
            favourite_packages: vec![
                "com.example.game".into(),
                "gone.app".into(),
                "tv.kodi.Kodi".into(),
            ],
            ..UserPreferences::default()
        };
        let favs = favourites(&all, &prefs);
        let ids: Vec<&str> = favs.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, vec!["com.example.game", "tv.kodi.Kodi"]);
    }

    #[test]
    fn step_wraps_only_when_enabled() {
        assert_eq!(step(0, -1, 4, false), 0);
        assert_eq!(step(0, -1, 4, true), 3);
        assert_eq!(step(3, 1, 4, false), 3);
        assert_eq!(step(3, 1, 4, true), 0);
    }
}
