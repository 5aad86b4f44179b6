use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    let d = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cleartv");
    let _ = std::fs::create_dir_all(&d);
    d
}

pub fn preferences_file() -> PathBuf {
    config_dir().join("preferences.json")
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

/// Load a JSON file, falling back to `Default` when the file is missing or
/// cannot be parsed. Corrupt local state must never block the UI.
pub fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

// ── Preference model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScreensaverType {
    #[default]
    Dim,
    Clock,
    Slideshow,
}

/// Timeout choices offered by the settings panel, in minutes.
pub const SCREENSAVER_TIMEOUTS_MIN: &[u32] = &[5, 10, 15, 30, 60];

/// Display-order cap on the favourites row.
pub const MAX_FAVOURITES: usize = 6;

/// The whole record is persisted as a single JSON object and replaced
/// atomically on every update. Unknown fields are ignored on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: ThemeMode,
    #[serde(default = "default_true")]
    pub screensaver_enabled: bool,
    #[serde(default = "default_screensaver_timeout")]
    pub screensaver_timeout_min: u32,
    #[serde(default)]
    pub screensaver_type: ScreensaverType,
    #[serde(default = "default_true")]
    pub show_weather: bool,
    #[serde(default = "default_true")]
    pub show_clock: bool,
    /// Empty means "use the default location".
    #[serde(default)]
    pub weather_location: String,
    #[serde(default = "default_true")]
    pub weather_celsius: bool,
    #[serde(default = "default_true")]
    pub weather_12hr: bool,
    /// 0 = low, 1 = medium, 2 = high.
    #[serde(default = "default_blur")]
    pub blur_intensity: u8,
    /// Ordered; insertion order is display order. Capped at MAX_FAVOURITES.
    #[serde(default)]
    pub favourite_packages: Vec<String>,
    /// Set semantics; order irrelevant.
    #[serde(default)]
    pub hidden_packages: Vec<String>,
    /// Empty means "use the default gradient".
    #[serde(default)]
    pub wallpaper_path: String,
    /// Hex colour, empty means "use the default".
    #[serde(default)]
    pub wallpaper_colour: String,
    #[serde(default)]
    pub show_system_apps: bool,
    #[serde(default)]
    pub wrap_focus: bool,
}

const fn default_true() -> bool {
    true
}
const fn default_screensaver_timeout() -> u32 {
    10
}
const fn default_blur() -> u8 {
    1
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            screensaver_enabled: true,
            screensaver_timeout_min: 10,
            screensaver_type: ScreensaverType::Dim,
            show_weather: true,
            show_clock: true,
            weather_location: String::new(),
            weather_celsius: true,
            weather_12hr: true,
            blur_intensity: 1,
            favourite_packages: Vec::new(),
            hidden_packages: Vec::new(),
            wallpaper_path: String::new(),
            wallpaper_colour: String::new(),
            show_system_apps: false,
            wrap_focus: false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = std::env::temp_dir().join(format!("cleartv-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.json");
        std::fs::write(&path, "{not json at all").unwrap();
        let prefs: UserPreferences = load_json(&path);
        assert_eq!(prefs, UserPreferences::default());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let prefs: UserPreferences = load_json(Path::new("/nonexistent/cleartv/prefs.json"));
        assert_eq!(prefs, UserPreferences::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = r#"{"theme":"dark","future_field":42,"show_clock":false}"#;
        let prefs: UserPreferences = serde_json::from_str(raw).unwrap();
        assert_eq!(prefs.theme, ThemeMode::Dark);
        assert!(!prefs.show_clock);
        // Everything else falls back to the field default.
        assert_eq!(prefs.screensaver_timeout_min, 10);
        assert!(prefs.screensaver_enabled);
    }

    #[test]
    fn round_trips_through_json() {
        let prefs = UserPreferences {
            favourite_packages: vec!["org.example.tv".into()],
            screensaver_type: ScreensaverType::Clock,
            ..UserPreferences::default()
        };
        let json = serde_json::to_string(&prefs).unwrap();
        let back: UserPreferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefs);
    }
}
