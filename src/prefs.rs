use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use crate::config::{load_json, save_json, ScreensaverType, ThemeMode, UserPreferences, MAX_FAVOURITES};

/// Durable store for the single [`UserPreferences`] record.
///
/// Every mutation goes through [`PrefStore::update`]: read current, apply a
/// transform, write the whole record back, notify subscribers. One mutex
/// guards the cycle, so concurrent updates never interleave.
pub struct PrefStore {
    inner: Mutex<Inner>,
}

struct Inner {
    current: UserPreferences,
    path: PathBuf,
    subscribers: Vec<Sender<UserPreferences>>,
}

impl PrefStore {
    /// Open the store backed by the given file. A missing or corrupt file
    /// yields the default record; the error is deliberately swallowed.
    pub fn open(path: PathBuf) -> Self {
        let current = load_json(&path);
        Self {
            inner: Mutex::new(Inner {
                current,
                path,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Snapshot of the current record. Always succeeds.
    pub fn read(&self) -> UserPreferences {
        self.inner
            .lock()
            .map(|g| g.current.clone())
            .unwrap_or_default()
    }

    /// Live stream of preference snapshots, starting with the current value.
    pub fn subscribe(&self) -> Receiver<UserPreferences> {
        let (tx, rx) = channel();
        if let Ok(mut guard) = self.inner.lock() {
            let _ = tx.send(guard.current.clone());
            guard.subscribers.push(tx);
        }
        rx
    }

    /// Atomic read-modify-write. The transform sees the latest committed
    /// record; the result replaces it wholesale and is persisted before
    /// subscribers are notified. Disconnected subscribers are dropped.
    pub fn update<F: FnOnce(&mut UserPreferences)>(&self, transform: F) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let mut next = guard.current.clone();
        transform(&mut next);
        let _ = save_json(&guard.path, &next);
        guard.current = next.clone();
        guard.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
    }

    // ── Convenience transforms ───────────────────────────────────────────────

    pub fn set_theme(&self, theme: ThemeMode) {
        self.update(|p| p.theme = theme);
    }

    /// Remove if present; otherwise append, silently refusing past the
    /// favourites cap. Running out of slots is not an error.
    pub fn toggle_favourite(&self, pkg: &str) {
        self.update(|p| {
            if let Some(i) = p.favourite_packages.iter().position(|f| f == pkg) {
                p.favourite_packages.remove(i);
            } else if p.favourite_packages.len() < MAX_FAVOURITES {
                p.favourite_packages.push(pkg.to_string());
            }
        });
    }

    /// Idempotent. Hiding an app also strips its favourite status.
    pub fn hide_app(&self, pkg: &str) {
        self.update(|p| {
            if !p.hidden_packages.iter().any(|h| h == pkg) {
                p.hidden_packages.push(pkg.to_string());
            }
            p.favourite_packages.retain(|f| f != pkg);
        });
    }

    /// Idempotent.
    pub fn unhide_app(&self, pkg: &str) {
        self.update(|p| p.hidden_packages.retain(|h| h != pkg));
    }

    pub fn set_blur_intensity(&self, level: u8) {
        self.update(|p| p.blur_intensity = level.min(2));
    }

    pub fn set_show_system_apps(&self, show: bool) {
        self.update(|p| p.show_system_apps = show);
    }

    pub fn set_show_weather(&self, show: bool) {
        self.update(|p| p.show_weather = show);
    }

    pub fn set_show_clock(&self, show: bool) {
        self.update(|p| p.show_clock = show);
    }

    pub fn set_weather_location(&self, location: &str) {
        self.update(|p| p.weather_location = location.trim().to_string());
    }

    pub fn set_weather_celsius(&self, celsius: bool) {
        self.update(|p| p.weather_celsius = celsius);
    }

    pub fn set_weather_12hr(&self, use_12hr: bool) {
        self.update(|p| p.weather_12hr = use_12hr);
    }

    pub fn set_wrap_focus(&self, wrap: bool) {
        self.update(|p| p.wrap_focus = wrap);
    }

    pub fn set_screensaver_enabled(&self, enabled: bool) {
        self.update(|p| p.screensaver_enabled = enabled);
    }

    pub fn set_screensaver_timeout(&self, minutes: u32) {
        self.update(|p| p.screensaver_timeout_min = minutes);
    }

    pub fn set_screensaver_type(&self, kind: ScreensaverType) {
        self.update(|p| p.screensaver_type = kind);
    }

    pub fn set_wallpaper_colour(&self, colour: &str) {
        self.update(|p| p.wallpaper_colour = colour.trim().to_string());
    }

    pub fn restore_defaults(&self) {
        self.update(|p| *p = UserPreferences::default());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_store(name: &str) -> (PrefStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "cleartv-prefs-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.json");
        (PrefStore::open(path), dir)
    }

    #[test]
    fn favourites_never_exceed_cap() {
        let (store, dir) = temp_store("cap");
        for i in 0..10 {
            store.toggle_favourite(&format!("app{i}"));
        }
        assert_eq!(store.read().favourite_packages.len(), MAX_FAVOURITES);
        // The seventh onwards were silent no-ops.
        assert_eq!(
            store.read().favourite_packages,
            vec!["app0", "app1", "app2", "app3", "app4", "app5"]
        );
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn toggle_removes_existing_favourite() {
        let (store, dir) = temp_store("toggle");
        store.toggle_favourite("tv.app");
        store.toggle_favourite("tv.app");
        assert!(store.read().favourite_packages.is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn hide_removes_favourite_status() {
        let (store, dir) = temp_store("hide");
        store.toggle_favourite("tv.app");
        store.hide_app("tv.app");
        let prefs = store.read();
        assert!(!prefs.favourite_packages.iter().any(|f| f == "tv.app"));
        assert!(prefs.hidden_packages.iter().any(|h| h == "tv.app"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn hide_and_unhide_are_idempotent() {
        let (store, dir) = temp_store("idem");
        store.hide_app("tv.app");
        store.hide_app("tv.app");
        assert_eq!(store.read().hidden_packages, vec!["tv.app"]);
        store.unhide_app("tv.app");
        let once = store.read().hidden_packages;
        store.unhide_app("tv.app");
        assert_eq!(store.read().hidden_packages, once);
        assert!(once.is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn blur_intensity_is_clamped() {
        let (store, dir) = temp_store("blur");
        store.set_blur_intensity(9);
        assert_eq!(store.read().blur_intensity, 2);
        store.set_blur_intensity(0);
        assert_eq!(store.read().blur_intensity, 0);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn restore_defaults_resets_every_field() {
        let (store, dir) = temp_store("restore");
        store.set_theme(ThemeMode::Light);
        store.toggle_favourite("tv.app");
        store.hide_app("other.app");
        store.set_screensaver_timeout(60);
        store.set_weather_location("Oslo");
        store.restore_defaults();
        assert_eq!(store.read(), UserPreferences::default());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn subscription_starts_with_current_then_sees_updates() {
        let (store, dir) = temp_store("sub");
        store.set_theme(ThemeMode::Dark);
        let rx = store.subscribe();
        assert_eq!(rx.recv().unwrap().theme, ThemeMode::Dark);
        store.set_theme(ThemeMode::Light);
        assert_eq!(rx.recv().unwrap().theme, ThemeMode::Light);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn updates_survive_reopen() {
        let (store, dir) = temp_store("reopen");
        let path = dir.join("preferences.json");
        store.toggle_favourite("tv.app");
        drop(store);
        let reopened = PrefStore::open(path);
        assert_eq!(reopened.read().favourite_packages, vec!["tv.app"]);
        std::fs::remove_dir_all(dir).ok();
    }
}
