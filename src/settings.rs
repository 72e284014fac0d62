use std::path::{Path, PathBuf};

use crate::components::history::DEFAULT_MAX_UNDO;
use crate::render::Theme;

/// Logical pixels per cell at 100% zoom.
pub const DEFAULT_CELL_SIZE: f32 = 20.0;

/// User preferences, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub theme: Theme,
    pub base_cell_size: f32,
    pub max_undo_steps: usize,
    pub show_labels: bool,
    pub show_center_mark: bool,
    /// Palette JSON (`{ group: { id: hex } }`); empty means no palette.
    pub palette_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            base_cell_size: DEFAULT_CELL_SIZE,
            max_undo_steps: DEFAULT_MAX_UNDO,
            show_labels: true,
            show_center_mark: true,
            palette_path: String::new(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/perlerpad/perlerpad_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PerlerPad\perlerpad_settings.cfg
    /// On macOS:   ~/Library/Application Support/PerlerPad/perlerpad_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("perlerpad");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("perlerpad_settings.cfg"))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("PerlerPad");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("perlerpad_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PerlerPad");
            let _ = std::fs::create_dir_all(&config_dir);
            Some(config_dir.join("perlerpad_settings.cfg"))
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("perlerpad_settings.cfg")))
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Load from the platform path (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "theme={}\n\
             base_cell_size={}\n\
             max_undo_steps={}\n\
             show_labels={}\n\
             show_center_mark={}\n\
             palette_path={}\n",
            self.theme,
            self.base_cell_size,
            self.max_undo_steps,
            self.show_labels,
            self.show_center_mark,
            self.palette_path,
        )
    }

    /// Unknown keys are ignored; unparseable values keep their default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "theme" => {
                    s.theme = val.parse().unwrap_or_default();
                }
                "base_cell_size" => {
                    s.base_cell_size = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 2.0)
                        .unwrap_or(DEFAULT_CELL_SIZE);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v > 0)
                        .unwrap_or(DEFAULT_MAX_UNDO);
                }
                "show_labels" => {
                    s.show_labels = val == "true";
                }
                "show_center_mark" => {
                    s.show_center_mark = val == "true";
                }
                "palette_path" => {
                    s.palette_path = val.to_string();
                }
                _ => {}
            }
        }
        s
    }

    pub fn palette_path(&self) -> Option<PathBuf> {
        (!self.palette_path.is_empty()).then(|| PathBuf::from(&self.palette_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let settings = AppSettings {
            theme: Theme::Dark,
            base_cell_size: 24.0,
            max_undo_steps: 40,
            show_labels: false,
            show_center_mark: true,
            palette_path: "/tmp/mard.json".into(),
        };
        assert_eq!(AppSettings::parse(&settings.to_config_string()), settings);
    }

    #[test]
    fn bad_values_fall_back_per_key() {
        let s = AppSettings::parse("theme=sepia\nmax_undo_steps=lots\nbase_cell_size=1\nshow_labels=false\nnoise");
        assert_eq!(s.theme, Theme::Light);
        assert_eq!(s.max_undo_steps, DEFAULT_MAX_UNDO);
        assert_eq!(s.base_cell_size, DEFAULT_CELL_SIZE);
        assert!(!s.show_labels);
        assert_eq!(s.palette_path(), None);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let s = AppSettings::load_from(Path::new("/definitely/not/here.cfg"));
        assert_eq!(s, AppSettings::default());
    }
}
