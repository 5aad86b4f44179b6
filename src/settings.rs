use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::sync::Arc;

use crate::apps::AppInfo;
use crate::config::{
    ScreensaverType, ThemeMode, UserPreferences, SCREENSAVER_TIMEOUTS_MIN,
};
use crate::prefs::PrefStore;
use crate::ui::{pad_horizontal, Palette};

// ── Read-only projections ─────────────────────────────────────────────────────
// Stored ids resolve against the directory snapshot; anything no longer
// installed silently drops out.

pub fn hidden_apps<'a>(all: &'a [AppInfo], prefs: &UserPreferences) -> Vec<&'a AppInfo> {
    prefs
        .hidden_packages
        .iter()
        .filter_map(|id| all.iter().find(|a| &a.app_id == id))
        .collect()
}

pub fn favourite_apps<'a>(all: &'a [AppInfo], prefs: &UserPreferences) -> Vec<&'a AppInfo> {
    prefs
        .favourite_packages
        .iter()
        .filter_map(|id| all.iter().find(|a| &a.app_id == id))
        .collect()
}

// ── Panel rows ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Theme,
    Blur,
    WallpaperColour,
    ShowClock,
    ShowWeather,
    WeatherLocation,
    Units,
    ClockFormat,
    SaverEnabled,
    SaverTimeout,
    SaverType,
    ShowSystemApps,
    WrapFocus,
    Favourites,
    HiddenApps,
    RestoreDefaults,
    Back,
}

enum Row {
    Header(&'static str),
    Item(Item),
}

fn rows() -> Vec<Row> {
    use Item::*;
    vec![
        Row::Header("Appearance"),
        Row::Item(Theme),
        Row::Item(Blur),
        Row::Item(WallpaperColour),
        Row::Item(ShowClock),
        Row::Item(ShowWeather),
        Row::Header("Weather"),
        Row::Item(WeatherLocation),
        Row::Item(Units),
        Row::Item(ClockFormat),
        Row::Header("Screensaver"),
        Row::Item(SaverEnabled),
        Row::Item(SaverTimeout),
        Row::Item(SaverType),
        Row::Header("Apps"),
        Row::Item(ShowSystemApps),
        Row::Item(WrapFocus),
        Row::Item(Favourites),
        Row::Item(HiddenApps),
        Row::Header(""),
        Row::Item(RestoreDefaults),
        Row::Item(Back),
    ]
}

fn on_off(v: bool) -> &'static str {
    if v {
        "ON"
    } else {
        "OFF"
    }
}

fn item_label(item: Item, prefs: &UserPreferences, counts: (usize, usize)) -> String {
    match item {
        Item::Theme => format!(
            "Theme: {} [cycle]",
            match prefs.theme {
                ThemeMode::Light => "Light",
                ThemeMode::Dark => "Dark",
                ThemeMode::System => "System",
            }
        ),
        Item::Blur => format!(
            "Blur Intensity: {} [cycle]",
            match prefs.blur_intensity {
                0 => "Low",
                1 => "Medium",
                _ => "High",
            }
        ),
        Item::WallpaperColour => format!(
            "Wallpaper Colour: {} [edit]",
            if prefs.wallpaper_colour.is_empty() {
                "(theme default)"
            } else {
                &prefs.wallpaper_colour
            }
        ),
        Item::ShowClock => format!("Show Clock: {} [toggle]", on_off(prefs.show_clock)),
        Item::ShowWeather => format!("Show Weather: {} [toggle]", on_off(prefs.show_weather)),
        Item::WeatherLocation => format!(
            "Location: {} [edit]",
            if prefs.weather_location.is_empty() {
                "(default)"
            } else {
                &prefs.weather_location
            }
        ),
        Item::Units => format!(
            "Units: {} [toggle]",
            if prefs.weather_celsius { "Celsius" } else { "Fahrenheit" }
        ),
        Item::ClockFormat => format!(
            "Clock Format: {} [toggle]",
            if prefs.weather_12hr { "12hr" } else { "24hr" }
        ),
        Item::SaverEnabled => format!(
            "Screensaver: {} [toggle]",
            on_off(prefs.screensaver_enabled)
        ),
        Item::SaverTimeout => format!(
            "Timeout: {} min [cycle]",
            prefs.screensaver_timeout_min
        ),
        Item::SaverType => format!(
            "Type: {} [cycle]",
            match prefs.screensaver_type {
                ScreensaverType::Dim => "Dim",
                ScreensaverType::Clock => "Clock",
                ScreensaverType::Slideshow => "Slideshow",
            }
        ),
        Item::ShowSystemApps => format!(
            "Show System Apps: {} [toggle]",
            on_off(prefs.show_system_apps)
        ),
        Item::WrapFocus => format!("Wrap Focus: {} [toggle]", on_off(prefs.wrap_focus)),
        Item::Favourites => format!("Favourites ({}) →", counts.0),
        Item::HiddenApps => format!("Hidden Apps ({}) →", counts.1),
        Item::RestoreDefaults => "Restore Defaults".to_string(),
        Item::Back => "Back".to_string(),
    }
}

pub fn next_timeout(current: u32) -> u32 {
    let i = SCREENSAVER_TIMEOUTS_MIN
        .iter()
        .position(|&t| t == current)
        .unwrap_or(0);
    SCREENSAVER_TIMEOUTS_MIN[(i + 1) % SCREENSAVER_TIMEOUTS_MIN.len()]
}

// ── Screen ────────────────────────────────────────────────────────────────────

enum Mode {
    List,
    EditLocation(String),
    EditColour(String),
    Favourites(usize),
    Hidden(usize),
    ConfirmRestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    None,
    Back,
}

/// Thin façade over the preference store: every mutation below is a single
/// store transform, and the list labels re-read the store each draw.
pub struct SettingsScreen {
    store: Arc<PrefStore>,
    idx: usize,
    mode: Mode,
}

impl SettingsScreen {
    pub fn new(store: Arc<PrefStore>) -> Self {
        Self {
            store,
            idx: 0,
            mode: Mode::List,
        }
    }

    fn items() -> Vec<Item> {
        rows()
            .into_iter()
            .filter_map(|r| match r {
                Row::Item(i) => Some(i),
                Row::Header(_) => None,
            })
            .collect()
    }

    pub fn handle_key(&mut self, code: KeyCode, all_apps: &[AppInfo]) -> SettingsAction {
        match &mut self.mode {
            Mode::List => self.handle_list_key(code),
            Mode::EditLocation(buf) => {
                match code {
                    KeyCode::Enter => {
                        let location = buf.clone();
                        self.store.set_weather_location(&location);
                        self.mode = Mode::List;
                    }
                    KeyCode::Esc => self.mode = Mode::List,
                    KeyCode::Backspace => {
                        buf.pop();
                    }
                    KeyCode::Char(c) if (c as u32) >= 32 => buf.push(c),
                    _ => {}
                }
                SettingsAction::None
            }
            Mode::EditColour(buf) => {
                match code {
                    KeyCode::Enter => {
                        let colour = buf.clone();
                        self.store.set_wallpaper_colour(&colour);
                        self.mode = Mode::List;
                    }
                    KeyCode::Esc => self.mode = Mode::List,
                    KeyCode::Backspace => {
                        buf.pop();
                    }
                    KeyCode::Char(c) if c == '#' || c.is_ascii_hexdigit() => buf.push(c),
                    _ => {}
                }
                SettingsAction::None
            }
            Mode::Favourites(sel) => {
                let prefs = self.store.read();
                let favs = favourite_apps(all_apps, &prefs);
                match code {
                    KeyCode::Up => *sel = sel.saturating_sub(1),
                    KeyCode::Down if !favs.is_empty() => *sel = (*sel + 1).min(favs.len() - 1),
                    KeyCode::Enter => {
                        if let Some(app) = favs.get(*sel) {
                            let id = app.app_id.clone();
                            self.store.toggle_favourite(&id);
                            *sel = sel.saturating_sub(1).min(favs.len().saturating_sub(2));
                        }
                    }
                    KeyCode::Esc | KeyCode::Char('q') => self.mode = Mode::List,
                    _ => {}
                }
                SettingsAction::None
            }
            Mode::Hidden(sel) => {
                let prefs = self.store.read();
                let hidden = hidden_apps(all_apps, &prefs);
                match code {
                    KeyCode::Up => *sel = sel.saturating_sub(1),
                    KeyCode::Down if !hidden.is_empty() => *sel = (*sel + 1).min(hidden.len() - 1),
                    KeyCode::Enter => {
                        if let Some(app) = hidden.get(*sel) {
                            let id = app.app_id.clone();
                            self.store.unhide_app(&id);
                            *sel = sel.saturating_sub(1).min(hidden.len().saturating_sub(2));
                        }
                    }
                    KeyCode::Esc | KeyCode::Char('q') => self.mode = Mode::List,
                    _ => {}
                }
                SettingsAction::None
            }
            Mode::ConfirmRestore => {
                match code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => {
                        self.store.restore_defaults();
                        self.mode = Mode::List;
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        self.mode = Mode::List;
                    }
                    _ => {}
                }
                SettingsAction::None
            }
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> SettingsAction {
        let items = Self::items();
        match code {
            KeyCode::Up => self.idx = self.idx.saturating_sub(1),
            KeyCode::Down => self.idx = (self.idx + 1).min(items.len() - 1),
            KeyCode::Esc | KeyCode::Char('q') => return SettingsAction::Back,
            KeyCode::Enter => return self.activate(items[self.idx]),
            _ => {}
        }
        SettingsAction::None
    }

    fn activate(&mut self, item: Item) -> SettingsAction {
        let prefs = self.store.read();
        match item {
            Item::Theme => self.store.set_theme(match prefs.theme {
                ThemeMode::Light => ThemeMode::Dark,
                ThemeMode::Dark => ThemeMode::System,
                ThemeMode::System => ThemeMode::Light,
            }),
            Item::Blur => self
                .store
                .set_blur_intensity((prefs.blur_intensity + 1) % 3),
            Item::ShowClock => self.store.set_show_clock(!prefs.show_clock),
            Item::ShowWeather => self.store.set_show_weather(!prefs.show_weather),
            Item::WallpaperColour => {
                self.mode = Mode::EditColour(prefs.wallpaper_colour.clone());
            }
            Item::WeatherLocation => {
                self.mode = Mode::EditLocation(prefs.weather_location.clone());
            }
            Item::Units => self.store.set_weather_celsius(!prefs.weather_celsius),
            Item::ClockFormat => self.store.set_weather_12hr(!prefs.weather_12hr),
            Item::SaverEnabled => self
                .store
                .set_screensaver_enabled(!prefs.screensaver_enabled),
            Item::SaverTimeout => self
                .store
                .set_screensaver_timeout(next_timeout(prefs.screensaver_timeout_min)),
            Item::SaverType => self.store.set_screensaver_type(match prefs.screensaver_type {
                ScreensaverType::Dim => ScreensaverType::Clock,
                ScreensaverType::Clock => ScreensaverType::Slideshow,
                ScreensaverType::Slideshow => ScreensaverType::Dim,
            }),
            Item::ShowSystemApps => self.store.set_show_system_apps(!prefs.show_system_apps),
            Item::WrapFocus => self.store.set_wrap_focus(!prefs.wrap_focus),
            Item::Favourites => self.mode = Mode::Favourites(0),
            Item::HiddenApps => self.mode = Mode::Hidden(0),
            Item::RestoreDefaults => self.mode = Mode::ConfirmRestore,
            Item::Back => return SettingsAction::Back,
        }
        SettingsAction::None
    }

    // ── Rendering ────────────────────────────────────────────────────────────

    pub fn render(&self, f: &mut Frame, all_apps: &[AppInfo]) {
        let prefs = self.store.read();
        let palette = Palette::from_prefs(&prefs);
        let area = f.area();
        f.render_widget(Paragraph::new("").style(palette.normal()), area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(area);

        let title = Paragraph::new("Settings")
            .alignment(Alignment::Center)
            .style(palette.title());
        f.render_widget(title, chunks[0]);

        match &self.mode {
            Mode::List => self.render_list(f, chunks[2], &prefs, all_apps, &palette),
            Mode::EditLocation(buf) => {
                let p = Paragraph::new(format!(
                    "City or postcode (empty = default):\n\n  > {buf}█"
                ))
                .style(palette.normal());
                f.render_widget(p, pad_horizontal(chunks[2]));
            }
            Mode::EditColour(buf) => {
                let p = Paragraph::new(format!(
                    "Hex colour, e.g. #10141c (empty = theme default):\n\n  > {buf}█"
                ))
                .style(palette.normal());
                f.render_widget(p, pad_horizontal(chunks[2]));
            }
            Mode::Favourites(sel) => {
                let favs = favourite_apps(all_apps, &prefs);
                render_app_list(f, chunks[2], "Enter = remove from favourites", &favs, *sel, &palette);
            }
            Mode::Hidden(sel) => {
                let hidden = hidden_apps(all_apps, &prefs);
                render_app_list(f, chunks[2], "Enter = restore app", &hidden, *sel, &palette);
            }
            Mode::ConfirmRestore => {
                let p = Paragraph::new("Restore all settings to defaults?\n\n  [y] Yes    [n] No")
                    .style(palette.normal());
                f.render_widget(p, pad_horizontal(chunks[2]));
            }
        }

        let hint = Paragraph::new("↑↓ navigate   Enter select   Esc back").style(palette.dim());
        f.render_widget(hint, pad_horizontal(chunks[3]));
    }

    fn render_list(
        &self,
        f: &mut Frame,
        area: ratatui::layout::Rect,
        prefs: &UserPreferences,
        all_apps: &[AppInfo],
        palette: &Palette,
    ) {
        let counts = (
            favourite_apps(all_apps, prefs).len(),
            hidden_apps(all_apps, prefs).len(),
        );
        let items = Self::items();
        let mut lines: Vec<Line> = Vec::new();
        let mut sel_line = 0usize;
        for row in rows() {
            match row {
                Row::Header(h) => {
                    if !h.is_empty() {
                        lines.push(Line::from(Span::styled(h, palette.title())));
                    } else {
                        lines.push(Line::from(""));
                    }
                }
                Row::Item(item) => {
                    let selected = items[self.idx] == item;
                    if selected {
                        sel_line = lines.len();
                    }
                    let label = item_label(item, prefs, counts);
                    let style = if selected {
                        palette.selected()
                    } else {
                        palette.normal()
                    };
                    let marker = if selected { "> " } else { "  " };
                    lines.push(Line::from(Span::styled(
                        format!("  {marker}{label}"),
                        style,
                    )));
                }
            }
        }
        // Scroll so the selection stays visible.
        let h = area.height as usize;
        let first = sel_line.saturating_sub(h.saturating_sub(1));
        let shown: Vec<Line> = lines.into_iter().skip(first).collect();
        f.render_widget(Paragraph::new(shown), pad_horizontal(area));
    }
}

fn render_app_list(
    f: &mut Frame,
    area: ratatui::layout::Rect,
    hint: &str,
    apps: &[&AppInfo],
    sel: usize,
    palette: &Palette,
) {
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(hint.to_string(), palette.dim())), Line::from("")];
    if apps.is_empty() {
        lines.push(Line::from(Span::styled("  (empty)", palette.dim())));
    }
    for (i, app) in apps.iter().enumerate() {
        let style = if i == sel {
            palette.selected()
        } else {
            palette.normal()
        };
        lines.push(Line::from(Span::styled(
            format!("  {}", app.label),
            style,
        )));
    }
    f.render_widget(Paragraph::new(lines), pad_horizontal(area));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, label: &str) -> AppInfo {
        AppInfo {
            app_id: id.to_string(),
            label: label.to_string(),
            exec: String::new(),
            icon: String::new(),
            is_system: false,
        }
    }

    #[test]
    fn projections_resolve_in_stored_order_and_drop_missing() {
        let all = vec![app("a", "A"), app("b", "B")];
        let prefs = UserPreferences {
            favourite_packages: vec!["b".into(), "gone".into(), "a".into()],
            hidden_packages: vec!["missing".into(), "a".into()],
            ..UserPreferences::default()
        };
        let favs: Vec<&str> = favourite_apps(&all, &prefs)
            .iter()
            .map(|a| a.app_id.as_str())
            .collect();
        assert_eq!(favs, vec!["b", "a"]);
        let hidden: Vec<&str> = hidden_apps(&all, &prefs)
            .iter()
            .map(|a| a.app_id.as_str())
            .collect();
        assert_eq!(hidden, vec!["a"]);
    }

    #[test]
    fn wallpaper_colour_edit_commits_to_the_store() {
        let dir = std::env::temp_dir().join(format!("cleartv-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(PrefStore::open(dir.join("preferences.json")));
        let mut screen = SettingsScreen::new(store.clone());

        // Theme, Blur, then Wallpaper Colour.
        screen.handle_key(KeyCode::Down, &[]);
        screen.handle_key(KeyCode::Down, &[]);
        screen.handle_key(KeyCode::Enter, &[]);
        for c in "#102030".chars() {
            screen.handle_key(KeyCode::Char(c), &[]);
        }
        // Non-hex input is ignored while editing.
        screen.handle_key(KeyCode::Char('z'), &[]);
        screen.handle_key(KeyCode::Enter, &[]);

        assert_eq!(store.read().wallpaper_colour, "#102030");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn timeout_cycles_through_the_fixed_set() {
        let mut t = 5;
        let mut seen = vec![t];
        for _ in 0..4 {
            t = next_timeout(t);
            seen.push(t);
        }
        assert_eq!(seen, vec![5, 10, 15, 30, 60]);
        assert_eq!(next_timeout(60), 5);
        // Unknown values restart the cycle.
        assert_eq!(next_timeout(7), 10);
    }
}
