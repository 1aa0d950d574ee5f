//! Persisted front-end settings and capture file naming.
//!
//! The settings file is plain `key=value` lines. Only `save_directory` is
//! read; other keys are ignored so older binaries can read newer files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::SettingsError;

const SAVE_DIRECTORY_KEY: &str = "save_directory";

/// User settings for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory relative capture file names are resolved against.
    pub save_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let save_directory = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { save_directory }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parses settings text. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(SettingsError::Malformed {
                    line: index + 1,
                    content: raw.to_string(),
                });
            };

            match key.trim() {
                SAVE_DIRECTORY_KEY => {
                    let value = value.trim();
                    if !value.is_empty() {
                        settings.save_directory = PathBuf::from(value);
                    }
                }
                other => tracing::debug!(key = other, "ignoring unknown settings key"),
            }
        }

        Ok(settings)
    }

    /// Writes the settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, self.to_string()).map_err(io_error)
    }

    /// Resolves a user-entered file name against [`save_directory`](Self::save_directory).
    ///
    /// Absolute paths are returned unchanged. A missing `.wav` extension is added.
    pub fn resolve_capture_path(&self, file_name: &str) -> PathBuf {
        let mut path = PathBuf::from(file_name.trim());
        if path.extension().is_none() {
            path.set_extension("wav");
        }
        if path.is_absolute() {
            path
        } else {
            self.save_directory.join(path)
        }
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{SAVE_DIRECTORY_KEY}={}", self.save_directory.display())
    }
}

/// Location of the settings file in the platform config directory.
///
/// Returns `None` if the platform has no config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rolling-capture").join("settings.conf"))
}

/// Suggested file name for a capture taken at `now`.
pub fn default_capture_file_name(now: DateTime<Local>) -> String {
    format!("capture_{}.wav", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_parse_save_directory() {
        let settings = Settings::parse("save_directory=/tmp/captures\n").unwrap();
        assert_eq!(settings.save_directory, PathBuf::from("/tmp/captures"));
    }

    #[test]
    fn test_parse_skips_comments_and_unknown_keys() {
        let text = "# settings\n\ntheme=dark\n  save_directory = /data/audio  \nvolume=11\n";
        let settings = Settings::parse(text).unwrap();
        assert_eq!(settings.save_directory, PathBuf::from("/data/audio"));
    }

    #[test]
    fn test_parse_malformed_line() {
        let err = Settings::parse("save_directory=/a\nnot a setting\n").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Malformed { line: 2, ref content } if content == "not a setting"
        ));
    }

    #[test]
    fn test_empty_value_keeps_default() {
        let settings = Settings::parse("save_directory=\n").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("missing.conf")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.conf");
        let settings = Settings {
            save_directory: dir.path().join("captures"),
        };

        settings.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("save_directory="));
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_resolve_capture_path() {
        let settings = Settings {
            save_directory: PathBuf::from("/captures"),
        };
        assert_eq!(
            settings.resolve_capture_path("take1"),
            PathBuf::from("/captures/take1.wav")
        );
        assert_eq!(
            settings.resolve_capture_path("take1.wav"),
            PathBuf::from("/captures/take1.wav")
        );
        assert_eq!(
            settings.resolve_capture_path("/elsewhere/x.wav"),
            PathBuf::from("/elsewhere/x.wav")
        );
    }

    #[test]
    fn test_default_capture_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(default_capture_file_name(now), "capture_20240309_070501.wav");
    }

    #[test]
    fn test_default_settings_path_file_name() {
        if let Some(path) = default_settings_path() {
            assert!(path.ends_with("rolling-capture/settings.conf"));
        }
    }
}
