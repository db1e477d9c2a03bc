use std::path::PathBuf;

use crate::io::DEFAULT_EXPORT_FILENAME;
use crate::ops::transform::Interpolation;
use crate::{log_info, log_warn};

// ============================================================================
// EDITOR SETTINGS - persisted as key=value lines
// ============================================================================

pub const SETTINGS_FILE_NAME: &str = "hubedit_settings.cfg";

/// User-tunable limits and defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Snapshots kept in history, including the current one.
    pub max_undo_steps: usize,
    /// Memory cap for history, in MiB. 0 disables the cap.
    pub max_history_mb: usize,
    /// Largest accepted edge, for both decode and resize.
    pub max_dimension: u32,
    pub interpolation: Interpolation,
    /// Family given to new text overlays.
    pub default_font: String,
    pub export_filename: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            max_history_mb: 256,
            max_dimension: 16384,
            interpolation: Interpolation::Bilinear,
            default_font: "Arial".to_string(),
            export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/hubedit/hubedit_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\HubEdit\hubedit_settings.cfg
    /// On macOS:   ~/Library/Application Support/HubEdit/hubedit_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("hubedit");
            Some(config_dir.join(SETTINGS_FILE_NAME))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            Some(PathBuf::from(appdata).join("HubEdit").join(SETTINGS_FILE_NAME))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("HubEdit")
                    .join(SETTINGS_FILE_NAME),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE_NAME)))
        }
    }

    /// History memory cap in bytes, `None` when disabled.
    pub fn max_history_bytes(&self) -> Option<usize> {
        (self.max_history_mb > 0).then(|| self.max_history_mb * 1024 * 1024)
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             max_history_mb={}\n\
             max_dimension={}\n\
             interpolation={}\n\
             default_font={}\n\
             export_filename={}\n",
            self.max_undo_steps,
            self.max_history_mb,
            self.max_dimension,
            self.interpolation.label(),
            self.default_font,
            self.export_filename,
        )
    }

    /// Parse config text. Unknown keys and bad values fall back to defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(50).max(1);
                }
                "max_history_mb" => {
                    s.max_history_mb = val.parse().unwrap_or(256);
                }
                "max_dimension" => {
                    s.max_dimension = val.parse().unwrap_or(16384).max(1);
                }
                "interpolation" => {
                    s.interpolation = val.parse().unwrap_or_default();
                }
                "default_font" => {
                    if !val.is_empty() {
                        s.default_font = val.to_string();
                    }
                }
                "export_filename" => {
                    if !val.is_empty() {
                        s.export_filename = val.to_string();
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        log_info!("settings: loaded {}", path.display());
        Self::parse(&content)
    }

    /// Save settings to disk. Failures are logged, not returned.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("settings: could not write {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_config_text() {
        let s = EditorSettings {
            max_undo_steps: 12,
            max_history_mb: 64,
            max_dimension: 4096,
            interpolation: Interpolation::Lanczos3,
            default_font: "DejaVu Sans".to_string(),
            export_filename: "out.png".to_string(),
        };
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let s = EditorSettings::parse(
            "max_undo_steps=lots\n\
             interpolation=sinc\n\
             garbage line\n\
             # max_dimension=1\n\
             unknown_key=1\n\
             default_font=\n",
        );
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn zero_history_mb_disables_memory_cap() {
        let s = EditorSettings::parse("max_history_mb=0");
        assert_eq!(s.max_history_bytes(), None);
        assert_eq!(EditorSettings::default().max_history_bytes(), Some(256 * 1024 * 1024));
    }
}
