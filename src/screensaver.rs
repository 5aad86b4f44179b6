use chrono::Local;
use rand::Rng;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use std::time::{Duration, Instant};

use crate::config::{ScreensaverType, UserPreferences};

// ── Controller ────────────────────────────────────────────────────────────────

/// What to do with a key event after the controller has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The key woke the screensaver; it must not reach the UI.
    Consumed,
    /// Normal input; forward to the focused screen.
    Propagate,
}

/// Idle-timeout state machine: Idle-Counting until the armed deadline
/// passes, then Active until dismissed. A single deadline is in flight at
/// any time — arming overwrites the previous one.
///
/// Time is passed in explicitly so the transitions are exact and the tests
/// can probe arbitrary instants.
pub struct ScreensaverController {
    active: bool,
    deadline: Option<Instant>,
}

impl ScreensaverController {
    pub fn new(now: Instant, prefs: &UserPreferences) -> Self {
        let mut controller = Self {
            active: false,
            deadline: None,
        };
        controller.arm(now, prefs);
        controller
    }

    /// Capture the preference snapshot at arm time. A disabled screensaver
    /// arms nothing: the controller sits in an inert Idle-Counting state.
    /// A mid-countdown preference change is honoured at the next reset.
    fn arm(&mut self, now: Instant, prefs: &UserPreferences) {
        self.deadline = prefs.screensaver_enabled.then(|| {
            now + Duration::from_secs(u64::from(prefs.screensaver_timeout_min) * 60)
        });
    }

    /// Cancel and re-arm the countdown from zero.
    pub fn reset_idle_timer(&mut self, now: Instant, prefs: &UserPreferences) {
        self.active = false;
        self.arm(now, prefs);
    }

    /// Active → Idle-Counting, restarting the countdown.
    pub fn dismiss(&mut self, now: Instant, prefs: &UserPreferences) {
        self.active = false;
        self.arm(now, prefs);
    }

    /// Advance the machine: fires exactly when the deadline is reached.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.active {
            if let Some(deadline) = self.deadline {
                if now >= deadline {
                    self.active = true;
                }
            }
        }
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Route a key-down event. Waking the screensaver consumes the key;
    /// otherwise the key resets the countdown and flows on.
    pub fn on_key(&mut self, now: Instant, prefs: &UserPreferences) -> KeyOutcome {
        if self.poll(now) {
            self.dismiss(now, prefs);
            KeyOutcome::Consumed
        } else {
            self.reset_idle_timer(now, prefs);
            KeyOutcome::Propagate
        }
    }
}

// ── Overlay rendering ─────────────────────────────────────────────────────────

/// Render state for the active overlay: the clock drifts a few cells on a
/// slow cycle so no pixel stays lit, and the slideshow placeholder cycles
/// through muted colours.
pub struct OverlayState {
    drift: (i16, i16),
    last_drift: Instant,
    hue_step: usize,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            drift: (0, 0),
            last_drift: Instant::now(),
            hue_step: 0,
        }
    }

    pub fn render(&mut self, f: &mut Frame, kind: ScreensaverType) {
        let area = f.area();
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("").style(Style::default().bg(Color::Black)),
            area,
        );
        match kind {
            ScreensaverType::Dim => {}
            ScreensaverType::Clock => self.render_clock(f, area),
            ScreensaverType::Slideshow => self.render_slideshow(f, area),
        }
    }

    fn render_clock(&mut self, f: &mut Frame, area: Rect) {
        if self.last_drift.elapsed() > Duration::from_secs(30) {
            let mut rng = rand::thread_rng();
            self.drift = (rng.gen_range(-6..=6), rng.gen_range(-2..=2));
            self.last_drift = Instant::now();
        }
        let time = Local::now().format("%H:%M").to_string();
        let w = (time.len() as u16 + 4).min(area.width);
        let x = (area.width.saturating_sub(w) / 2).saturating_add_signed(self.drift.0);
        let y = (area.height / 2).saturating_add_signed(self.drift.1);
        let rect = Rect::new(
            x.min(area.width.saturating_sub(w)),
            y.min(area.height.saturating_sub(1)),
            w,
            1,
        );
        let clock = Paragraph::new(Line::from(Span::styled(
            time,
            Style::default().fg(Color::White),
        )))
        .alignment(Alignment::Center);
        f.render_widget(clock, rect);
    }

    fn render_slideshow(&mut self, f: &mut Frame, area: Rect) {
        const HUES: &[Color] = &[
            Color::Rgb(30, 30, 60),
            Color::Rgb(25, 45, 45),
            Color::Rgb(45, 30, 45),
            Color::Rgb(40, 40, 25),
        ];
        if self.last_drift.elapsed() > Duration::from_secs(30) {
            self.hue_step = (self.hue_step + 1) % HUES.len();
            self.last_drift = Instant::now();
        }
        f.render_widget(
            Paragraph::new("").style(Style::default().bg(HUES[self.hue_step])),
            area,
        );
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserPreferences;

    fn prefs(enabled: bool, minutes: u32) -> UserPreferences {
        UserPreferences {
            screensaver_enabled: enabled,
            screensaver_timeout_min: minutes,
            ..UserPreferences::default()
        }
    }

    fn min(n: f64) -> Duration {
        Duration::from_secs_f64(n * 60.0)
    }

    #[test]
    fn activates_exactly_at_the_timeout() {
        let t0 = Instant::now();
        let p = prefs(true, 5);
        let mut c = ScreensaverController::new(t0, &p);
        assert!(!c.poll(t0 + min(4.999)));
        assert!(c.poll(t0 + min(5.0)));
    }

    #[test]
    fn reset_restarts_the_countdown() {
        let t0 = Instant::now();
        let p = prefs(true, 5);
        let mut c = ScreensaverController::new(t0, &p);
        c.reset_idle_timer(t0 + min(4.0), &p);
        assert!(!c.poll(t0 + min(4.0) + min(4.9)));
        assert!(c.poll(t0 + min(4.0) + min(5.0)));
    }

    #[test]
    fn disabled_at_arm_time_never_fires() {
        let t0 = Instant::now();
        let p = prefs(false, 5);
        let mut c = ScreensaverController::new(t0, &p);
        assert!(!c.poll(t0 + min(600.0)));
    }

    #[test]
    fn enabling_takes_effect_at_next_reset() {
        let t0 = Instant::now();
        let disabled = prefs(false, 5);
        let enabled = prefs(true, 5);
        let mut c = ScreensaverController::new(t0, &disabled);
        // Preference flipped mid-countdown: not honoured until a reset.
        assert!(!c.poll(t0 + min(10.0)));
        c.reset_idle_timer(t0 + min(10.0), &enabled);
        assert!(c.poll(t0 + min(15.0)));
    }

    #[test]
    fn key_is_consumed_only_while_active() {
        let t0 = Instant::now();
        let p = prefs(true, 5);
        let mut c = ScreensaverController::new(t0, &p);
        assert_eq!(c.on_key(t0 + min(1.0), &p), KeyOutcome::Propagate);
        // The reset above pushed the deadline to t0+1m+5m.
        assert_eq!(c.on_key(t0 + min(6.0), &p), KeyOutcome::Consumed);
        assert!(!c.is_active());
        // The dismissing key re-armed the timer; the next key propagates.
        assert_eq!(c.on_key(t0 + min(6.5), &p), KeyOutcome::Propagate);
    }

    #[test]
    fn dismiss_returns_to_idle_counting() {
        let t0 = Instant::now();
        let p = prefs(true, 5);
        let mut c = ScreensaverController::new(t0, &p);
        assert!(c.poll(t0 + min(5.0)));
        c.dismiss(t0 + min(5.0), &p);
        assert!(!c.poll(t0 + min(9.9)));
        assert!(c.poll(t0 + min(10.0)));
    }
}
