//! Startup settings read from the environment.
//!
//! There is no settings file. In development, `.env.local` (or `.env`) in
//! the project root is loaded first so overrides can live next to the code.
//! Unparseable values are logged and replaced by their defaults.

use crate::annotation::DEFAULT_STROKE_WIDTH;
use crate::geometry::ScaleConvention;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_OUTPUT_DIR: &str = "SIMPLESHOT_OUTPUT_DIR";
pub const ENV_SCALE_CONVENTION: &str = "SIMPLESHOT_SCALE_CONVENTION";
pub const ENV_FULLSCREEN_HOTKEY: &str = "SIMPLESHOT_FULLSCREEN_HOTKEY";
pub const ENV_AREA_HOTKEY: &str = "SIMPLESHOT_AREA_HOTKEY";
pub const ENV_CLIPBOARD_SETTLE_MS: &str = "SIMPLESHOT_CLIPBOARD_SETTLE_MS";
pub const ENV_STROKE_WIDTH: &str = "SIMPLESHOT_STROKE_WIDTH";

pub const DEFAULT_FULLSCREEN_HOTKEY: &str = "CommandOrControl+Shift+3";
pub const DEFAULT_AREA_HOTKEY: &str = "CommandOrControl+Shift+4";
pub const DEFAULT_CLIPBOARD_SETTLE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Overrides `<Pictures>/SimpleShot`.
    pub output_dir: Option<PathBuf>,
    pub scale_convention: ScaleConvention,
    pub fullscreen_hotkey: String,
    pub area_hotkey: String,
    /// Delay between the clipboard write and the "capture recorded"
    /// notification.
    pub clipboard_settle: Duration,
    pub stroke_width: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: None,
            scale_convention: ScaleConvention::default(),
            fullscreen_hotkey: DEFAULT_FULLSCREEN_HOTKEY.to_string(),
            area_hotkey: DEFAULT_AREA_HOTKEY.to_string(),
            clipboard_settle: Duration::from_millis(DEFAULT_CLIPBOARD_SETTLE_MS),
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scale_convention = get(ENV_SCALE_CONVENTION)
            .and_then(|v| parse_or_warn(ENV_SCALE_CONVENTION, &v, |v| v.parse().ok()))
            .unwrap_or(defaults.scale_convention);

        let clipboard_settle = get(ENV_CLIPBOARD_SETTLE_MS)
            .and_then(|v| parse_or_warn(ENV_CLIPBOARD_SETTLE_MS, &v, |v| v.parse::<u64>().ok()))
            .map(Duration::from_millis)
            .unwrap_or(defaults.clipboard_settle);

        let stroke_width = get(ENV_STROKE_WIDTH)
            .and_then(|v| {
                parse_or_warn(ENV_STROKE_WIDTH, &v, |v| {
                    v.parse::<f64>().ok().filter(|w| w.is_finite() && *w > 0.0)
                })
            })
            .unwrap_or(defaults.stroke_width);

        Self {
            output_dir: get(ENV_OUTPUT_DIR).map(PathBuf::from),
            scale_convention,
            fullscreen_hotkey: get(ENV_FULLSCREEN_HOTKEY).unwrap_or(defaults.fullscreen_hotkey),
            area_hotkey: get(ENV_AREA_HOTKEY).unwrap_or(defaults.area_hotkey),
            clipboard_settle,
            stroke_width,
        }
    }
}

fn parse_or_warn<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(value);
    if parsed.is_none() {
        log::warn!("[CONFIG] Ignoring invalid {}={:?}, using default", key, value);
    }
    parsed
}

/// Loads the first of `.env.local`, `.env` found in `root`.
///
/// Runs before the logger exists, so results go to stderr.
pub fn load_env_files(root: &Path) -> Option<PathBuf> {
    for env_file in [".env.local", ".env"] {
        let path = root.join(env_file);
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_OUTPUT_DIR, "/tmp/shots"),
            (ENV_SCALE_CONVENTION, "logical"),
            (ENV_FULLSCREEN_HOTKEY, "Alt+F1"),
            (ENV_CLIPBOARD_SETTLE_MS, " 250 "),
            (ENV_STROKE_WIDTH, "4.5"),
        ]));
        assert_eq!(s.output_dir, Some(PathBuf::from("/tmp/shots")));
        assert_eq!(s.scale_convention, ScaleConvention::Logical);
        assert_eq!(s.fullscreen_hotkey, "Alt+F1");
        assert_eq!(s.area_hotkey, DEFAULT_AREA_HOTKEY);
        assert_eq!(s.clipboard_settle, Duration::from_millis(250));
        assert_eq!(s.stroke_width, 4.5);
    }

    #[test]
    fn invalid_values_fall_back() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_SCALE_CONVENTION, "sideways"),
            (ENV_CLIPBOARD_SETTLE_MS, "-3"),
            (ENV_STROKE_WIDTH, "0"),
            (ENV_OUTPUT_DIR, "   "),
        ]));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn env_file_loading_prefers_local() {
        let dir = std::env::temp_dir().join(format!("simpleshot_env_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".env"), "SIMPLESHOT_TEST_ONLY_A=1\n").unwrap();
        std::fs::write(dir.join(".env.local"), "SIMPLESHOT_TEST_ONLY_B=2\n").unwrap();

        assert_eq!(load_env_files(&dir), Some(dir.join(".env.local")));
        assert_eq!(std::env::var("SIMPLESHOT_TEST_ONLY_B").as_deref(), Ok("2"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
