use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// An installed, launchable application. Recomputed on every scan; identity
/// is the desktop-entry id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_id: String,
    pub label: String,
    pub exec: String,
    pub icon: String,
    /// Tagged as a Settings/System utility via its Categories line.
    pub is_system: bool,
}

/// Our own desktop-entry id, excluded from every scan.
const SELF_APP_ID: &str = "cleartv";

// ── Scan ──────────────────────────────────────────────────────────────────────

/// Directories holding desktop entries, user entries first so they shadow
/// system ones.
fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = dirs::data_dir() {
        dirs.push(home.join("applications"));
        dirs.push(home.join("flatpak/exports/share/applications"));
    }
    dirs.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    dirs.push(PathBuf::from("/usr/local/share/applications"));
    dirs.push(PathBuf::from("/usr/share/applications"));
    dirs
}

/// All installed, launchable apps, sorted case-insensitively by label.
/// The underlying scan hits the filesystem and can be slow; call it off
/// the UI thread.
pub fn list_launchable_apps() -> Vec<AppInfo> {
    scan_dirs(&application_dirs())
}

fn scan_dirs(dirs: &[PathBuf]) -> Vec<AppInfo> {
    let mut apps: Vec<AppInfo> = Vec::new();
    for dir in dirs {
        let Ok(rd) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in rd.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Earlier (user) dirs shadow later (system) ones.
            if apps.iter().any(|a| a.app_id == id) {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Some(app) = parse_desktop_entry(id, &raw) {
                apps.push(app);
            }
        }
    }
    apps.retain(|a| a.app_id != SELF_APP_ID);
    apps.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    apps
}

/// Parse the `[Desktop Entry]` section of a .desktop file. Returns None for
/// anything the launcher cannot offer: hidden entries, entries without an
/// exec line, or non-application types.
fn parse_desktop_entry(id: &str, raw: &str) -> Option<AppInfo> {
    let mut in_main_section = false;
    let mut name = None;
    let mut exec = None;
    let mut icon = String::new();
    let mut kind = None;
    let mut categories = String::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_main_section = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "Name" if name.is_none() => name = Some(value.trim().to_string()),
            "Exec" if exec.is_none() => exec = Some(value.trim().to_string()),
            "Icon" if icon.is_empty() => icon = value.trim().to_string(),
            "Type" if kind.is_none() => kind = Some(value.trim().to_string()),
            "Categories" if categories.is_empty() => categories = value.trim().to_string(),
            "NoDisplay" | "Hidden" if value.trim() == "true" => return None,
            _ => {}
        }
    }

    if kind.as_deref().unwrap_or("Application") != "Application" {
        return None;
    }
    let exec = exec?;
    Some(AppInfo {
        app_id: id.to_string(),
        label: name.unwrap_or_else(|| id.to_string()),
        exec,
        icon,
        is_system: is_system_category(&categories),
    })
}

/// Entries tagged as OS configuration tools rather than user-facing
/// applications. Install location is no signal here: on most distros every
/// packaged app lands under /usr/share/applications.
fn is_system_category(categories: &str) -> bool {
    categories
        .split(';')
        .any(|c| matches!(c.trim(), "Settings" | "System"))
}

// ── Launch ────────────────────────────────────────────────────────────────────

/// Spawn the app's exec line, detached. Failure to resolve or spawn is a
/// silent no-op: the launcher never crashes over a broken entry.
pub fn launch(app: &AppInfo) {
    let argv = exec_to_argv(&app.exec);
    if argv.is_empty() {
        return;
    }
    let _ = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
}

/// Split an Exec line into argv, dropping desktop-entry field codes
/// (`%f`, `%U`, ...) that have no meaning without a file argument.
fn exec_to_argv(exec: &str) -> Vec<String> {
    exec.split_whitespace()
        .filter(|tok| !(tok.len() == 2 && tok.starts_with('%')))
        .map(|tok| tok.trim_matches('"').to_string())
        .collect()
}

// ── Change watcher ────────────────────────────────────────────────────────────

/// Polls the application directories and signals whenever their contents
/// change — the Linux stand-in for install/uninstall broadcasts. The home
/// view reacts by re-running the scan.
pub fn spawn_change_watcher() -> Receiver<()> {
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        let dirs = application_dirs();
        let mut last = dirs_fingerprint(&dirs);
        loop {
            std::thread::sleep(Duration::from_secs(5));
            let now = dirs_fingerprint(&dirs);
            if now != last {
                last = now;
                if tx.send(()).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

fn dirs_fingerprint(dirs: &[PathBuf]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for dir in dirs {
        fingerprint_dir(dir, &mut hasher);
    }
    hasher.finish()
}

fn fingerprint_dir(dir: &Path, hasher: &mut DefaultHasher) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in rd.flatten() {
        entry.file_name().hash(hasher);
        if let Ok(meta) = entry.metadata() {
            if let Ok(mtime) = meta.modified() {
                mtime.hash(hasher);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop(name: &str, exec: &str) -> String {
        format!("[Desktop Entry]\nType=Application\nName={name}\nExec={exec}\n")
    }

    fn write_entries(dir: &Path, entries: &[(&str, &str)]) {
        std::fs::create_dir_all(dir).unwrap();
        for (id, body) in entries {
            std::fs::write(dir.join(format!("{id}.desktop")), body).unwrap();
        }
    }

    #[test]
    fn sorts_case_insensitively_by_label() {
        let dir = std::env::temp_dir().join(format!("cleartv-apps-sort-{}", std::process::id()));
        write_entries(
            &dir,
            &[
                ("zebra", &desktop("Zebra", "zebra")),
                ("apple", &desktop("apple", "apple")),
                ("mango", &desktop("Mango", "mango")),
            ],
        );
        let apps = scan_dirs(&[dir.clone()]);
        let labels: Vec<&str> = apps.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["apple", "Mango", "Zebra"]);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn excludes_self_and_unlaunchable_entries() {
        let dir = std::env::temp_dir().join(format!("cleartv-apps-excl-{}", std::process::id()));
        write_entries(
            &dir,
            &[
                ("cleartv", &desktop("ClearTV", "cleartv")),
                ("noexec", "[Desktop Entry]\nType=Application\nName=Broken\n"),
                (
                    "hidden",
                    "[Desktop Entry]\nType=Application\nName=Ghost\nExec=ghost\nNoDisplay=true\n",
                ),
                ("ok", &desktop("Player", "player")),
            ],
        );
        let apps = scan_dirs(&[dir.clone()]);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].app_id, "ok");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn user_entries_shadow_system_entries() {
        let base = std::env::temp_dir().join(format!("cleartv-apps-shadow-{}", std::process::id()));
        let user = base.join("user");
        let system = base.join("system");
        write_entries(&user, &[("player", &desktop("My Player", "player --user"))]);
        write_entries(&system, &[("player", &desktop("Player", "player"))]);
        let apps = scan_dirs(&[user, system]);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].label, "My Player");
        std::fs::remove_dir_all(base).ok();
    }

    #[test]
    fn only_settings_categories_mark_an_app_as_system() {
        let panel = "[Desktop Entry]\nType=Application\nName=Control Panel\nExec=ctl\nCategories=Settings;HardwareSettings;\n";
        assert!(parse_desktop_entry("ctl", panel).unwrap().is_system);
        let monitor = "[Desktop Entry]\nType=Application\nName=Monitor\nExec=mon\nCategories=System;Monitor;\n";
        assert!(parse_desktop_entry("mon", monitor).unwrap().is_system);
        // A packaged media player is not a system app, wherever it lives.
        let player = "[Desktop Entry]\nType=Application\nName=Player\nExec=player\nCategories=AudioVideo;Player;\n";
        assert!(!parse_desktop_entry("player", player).unwrap().is_system);
        let plain = "[Desktop Entry]\nType=Application\nName=Plain\nExec=plain\n";
        assert!(!parse_desktop_entry("plain", plain).unwrap().is_system);
    }

    #[test]
    fn exec_field_codes_are_stripped() {
        assert_eq!(
            exec_to_argv("mpv --fullscreen %U"),
            vec!["mpv", "--fullscreen"]
        );
        assert_eq!(exec_to_argv("%f"), Vec::<String>::new());
    }

    #[test]
    fn non_application_types_are_skipped() {
        let raw = "[Desktop Entry]\nType=Link\nName=Docs\nExec=xdg-open\n";
        assert!(parse_desktop_entry("docs", raw).is_none());
    }
}
