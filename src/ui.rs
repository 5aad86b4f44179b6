use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    Terminal,
};

use crate::config::{ThemeMode, UserPreferences};

pub type Term = Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>;

// ── Padding ───────────────────────────────────────────────────────────────────
// Horizontal padding applied to every screen so text never touches the edges.
const H_PAD: u16 = 3;

/// Shrink a rect by H_PAD columns on each side.
pub fn pad_horizontal(area: Rect) -> Rect {
    let pad = H_PAD.min(area.width / 2);
    Rect {
        x: area.x + pad,
        y: area.y,
        width: area.width.saturating_sub(pad * 2),
        height: area.height,
    }
}

// ── Palette ───────────────────────────────────────────────────────────────────

/// Resolved colour scheme for the current theme preference. System leaves
/// the terminal's own colours in place.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub fg: Color,
    pub bg: Color,
    pub accent: Color,
}

impl Palette {
    pub fn from_prefs(prefs: &UserPreferences) -> Self {
        let mut palette = match prefs.theme {
            ThemeMode::Light => Self {
                fg: Color::Black,
                bg: Color::Rgb(235, 238, 242),
                accent: Color::Blue,
            },
            ThemeMode::Dark => Self {
                fg: Color::Rgb(225, 228, 232),
                bg: Color::Rgb(16, 20, 28),
                accent: Color::Cyan,
            },
            ThemeMode::System => Self {
                fg: Color::Reset,
                bg: Color::Reset,
                accent: Color::Cyan,
            },
        };
        // A wallpaper colour overrides the themed background gradient.
        if let Some(colour) = parse_hex_colour(&prefs.wallpaper_colour) {
            palette.bg = colour;
        }
        palette
    }

    pub fn normal(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .bg(self.bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn dim(&self) -> Style {
        Style::default()
            .fg(self.fg)
            .bg(self.bg)
            .add_modifier(Modifier::DIM)
    }
}

/// "#1a2b3c" or "1a2b3c" → Color::Rgb; anything else means "use default".
pub fn parse_hex_colour(raw: &str) -> Option<Color> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours_with_and_without_hash() {
        assert_eq!(parse_hex_colour("#10141c"), Some(Color::Rgb(16, 20, 28)));
        assert_eq!(parse_hex_colour("ffffff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_colour(""), None);
        assert_eq!(parse_hex_colour("#xyzxyz"), None);
        assert_eq!(parse_hex_colour("#fff"), None);
    }

    #[test]
    fn wallpaper_colour_overrides_theme_background() {
        let prefs = UserPreferences {
            theme: ThemeMode::Dark,
            wallpaper_colour: "#102030".into(),
            ..UserPreferences::default()
        };
        assert_eq!(Palette::from_prefs(&prefs).bg, Color::Rgb(16, 32, 48));
    }
}
