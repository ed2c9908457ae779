//! Settings loading with layer merging.
//!
//! Settings are loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (compiled into binary)
//! 2. User settings: `~/.config/vortex/settings.toml`
//! 3. Additional settings file (via `--settings` flag)
//!
//! Scalars are **overridden** by later layers when they differ from the default.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::Settings;

/// User settings directory name.
pub const USER_SETTINGS_DIR: &str = "vortex";

/// User settings filename.
pub const USER_SETTINGS_FILE: &str = "settings.toml";

/// Settings loader with support for layer merging.
pub struct SettingsLoader {
    /// Path to user settings.
    user_path: PathBuf,
}

impl SettingsLoader {
    /// Create a new SettingsLoader with the default user path.
    #[must_use]
    pub fn new() -> Self {
        let user_settings_dir = dirs::config_dir()
            .map(|p| p.join(USER_SETTINGS_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_SETTINGS_DIR));

        Self {
            user_path: user_settings_dir.join(USER_SETTINGS_FILE),
        }
    }

    /// Create a SettingsLoader with a custom user path (for testing).
    #[must_use]
    pub fn with_path(user_path: PathBuf) -> Self {
        Self { user_path }
    }

    /// Path of the user settings layer.
    pub fn user_path(&self) -> &Path {
        &self.user_path
    }

    /// Load and merge settings from all sources.
    ///
    /// A missing user file is not an error. A missing explicit file is.
    /// Invalid TOML is an error (fail fast with clear message).
    pub fn load(&self, explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();
        debug!("Loaded embedded default settings");

        if let Some(user) = self.load_file(&self.user_path)? {
            settings.merge(user);
            debug!("Loaded user settings from {:?}", self.user_path);
        } else {
            debug!("No user settings found at {:?}", self.user_path);
        }

        if let Some(path) = explicit {
            match self.load_file(path)? {
                Some(layer) => {
                    settings.merge(layer);
                    debug!("Loaded additional settings from {:?}", path);
                }
                None => {
                    return Err(ConfigError::ReadError {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified settings file not found",
                        ),
                    });
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load a settings file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<Settings>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let settings: Settings =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(Some(settings))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempdir().unwrap();
        let loader = SettingsLoader::with_path(dir.path().join("nonexistent.toml"));

        let settings = loader.load(None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_explicit_overrides_user() {
        let dir = tempdir().unwrap();

        fs::write(
            dir.path().join("user.toml"),
            r#"
            [supervisor]
            poll_interval_ms = 2000
            stop_timeout_ms = 1000
            "#,
        )
        .unwrap();

        fs::write(
            dir.path().join("explicit.toml"),
            r#"
            [supervisor]
            poll_interval_ms = 500
            "#,
        )
        .unwrap();

        let loader = SettingsLoader::with_path(dir.path().join("user.toml"));
        let settings = loader
            .load(Some(&dir.path().join("explicit.toml")))
            .unwrap();

        assert_eq!(settings.supervisor.poll_interval_ms, 500);
        assert_eq!(settings.supervisor.stop_timeout_ms, 1000);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let loader = SettingsLoader::with_path(dir.path().join("user.toml"));

        let result = loader.load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.toml"), "[supervisor\npoll = ").unwrap();

        let loader = SettingsLoader::with_path(dir.path().join("user.toml"));
        assert!(matches!(loader.load(None), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            r#"
            [controller]
            request_timeout_ms = 0
            "#,
        )
        .unwrap();

        let loader = SettingsLoader::with_path(dir.path().join("user.toml"));
        assert!(matches!(
            loader.load(None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
