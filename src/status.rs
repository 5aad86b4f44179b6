use chrono::Local;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::System;

use crate::config::UserPreferences;
use crate::ui::{pad_horizontal, Palette};
use crate::weather::WeatherData;

// ── Cached WiFi status ────────────────────────────────────────────────────────

struct WifiCache {
    label: String,
    ts: Instant,
}
static WIFI: Mutex<Option<WifiCache>> = Mutex::new(None);

fn wifi_status() -> String {
    let Ok(mut guard) = WIFI.lock() else {
        return "WiFi ▸ Unknown".to_string();
    };
    if guard
        .as_ref()
        .map_or(true, |c| c.ts.elapsed() > Duration::from_secs(30))
    {
        let label = read_wifi_linux();
        *guard = Some(WifiCache {
            label,
            ts: Instant::now(),
        });
    }
    guard
        .as_ref()
        .map(|c| c.label.clone())
        .unwrap_or_else(|| "WiFi ▸ Unknown".to_string())
}

/// /proc/net/wireless reports link quality per interface; quality tops out
/// around 70 on most drivers.
fn read_wifi_linux() -> String {
    let Ok(raw) = std::fs::read_to_string("/proc/net/wireless") else {
        return "No WiFi".to_string();
    };
    for line in raw.lines().skip(2) {
        let mut fields = line.split_whitespace();
        let Some(iface) = fields.next() else { continue };
        if !iface.ends_with(':') {
            continue;
        }
        fields.next(); // status
        if let Some(quality) = fields.next().and_then(|q| q.trim_end_matches('.').parse::<f32>().ok()) {
            return format!("WiFi ▸ {}", wifi_level_label(quality));
        }
    }
    "No WiFi".to_string()
}

fn wifi_level_label(quality: f32) -> &'static str {
    match quality {
        q if q >= 55.0 => "Strong",
        q if q >= 40.0 => "Good",
        q if q >= 25.0 => "Fair",
        _ => "Weak",
    }
}

fn device_name() -> String {
    System::host_name().unwrap_or_else(|| "TV Box".to_string())
}

// ── Top bar ───────────────────────────────────────────────────────────────────

/// One line: WiFi + device on the left, weather in the middle, clock on the
/// right. Clock and weather honour the relevant preference toggles.
pub fn render_top_bar(
    f: &mut Frame,
    area: Rect,
    prefs: &UserPreferences,
    weather: Option<&WeatherData>,
    palette: &Palette,
) {
    if area.height == 0 {
        return;
    }
    let area = pad_horizontal(area);

    let left = format!("{} | {}", wifi_status(), device_name());

    let middle = match (prefs.show_weather, weather) {
        (true, Some(w)) => format!(
            "{} {:.0}° {}",
            w.current.condition_icon, w.current.temperature, w.location_name
        ),
        (true, None) => "…".to_string(),
        (false, _) => String::new(),
    };

    let right = if prefs.show_clock {
        let fmt = if prefs.weather_12hr {
            "%a %d %b  %I:%M %p"
        } else {
            "%a %d %b  %H:%M"
        };
        Local::now().format(fmt).to_string()
    } else {
        String::new()
    };

    let width = area.width as usize;
    let used = left.chars().count() + middle.chars().count() + right.chars().count();
    let gap = width.saturating_sub(used);
    let line = Line::from(vec![
        Span::styled(left, palette.dim()),
        Span::styled(" ".repeat(gap / 2), palette.normal()),
        Span::styled(middle, palette.normal()),
        Span::styled(" ".repeat(gap - gap / 2), palette.normal()),
        Span::styled(right, palette.dim()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_maps_to_four_levels() {
        assert_eq!(wifi_level_label(70.0), "Strong");
        assert_eq!(wifi_level_label(55.0), "Strong");
        assert_eq!(wifi_level_label(45.0), "Good");
        assert_eq!(wifi_level_label(30.0), "Fair");
        assert_eq!(wifi_level_label(10.0), "Weak");
    }
}
