//! TOML configuration for the remapping daemon.
//!
//! Read from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\InputGate\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/inputgate/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/InputGate/config.toml`
//!
//! Example:
//!
//! ```toml
//! [general]
//! log_level = "debug"
//! slow_dispatch_warn_ms = 30
//!
//! [hooks]
//! log_pointer_events = false
//!
//! [[remap]]
//! source = "CapsLock"
//! target = "Escape"
//!
//! [[remap]]
//! source = "RightAlt"
//! target = "0x5B"
//! ```
//!
//! Key names are parsed by [`KeyCode`]'s `FromStr`; an unknown name is a
//! parse error for the whole file.  Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use inputgate_core::KeyCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure while reading or writing `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `APPDATA`, `XDG_CONFIG_HOME` nor `HOME` is usable.
    #[error("no config directory for this platform")]
    NoPlatformConfigDir,

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, or a key name that does not parse.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    /// Key bindings applied at start-up, in file order.
    #[serde(default)]
    pub remap: Vec<BindingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Dispatches slower than this are logged at `warn` level.
    #[serde(default = "default_slow_dispatch_warn_ms")]
    pub slow_dispatch_warn_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HooksConfig {
    /// Subscribes a listener that traces every pointer event.
    #[serde(default)]
    pub log_pointer_events: bool,
}

/// One `[[remap]]` entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingEntry {
    pub source: KeyCode,
    pub target: KeyCode,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_slow_dispatch_warn_ms() -> u64 {
    50
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            slow_dispatch_warn_ms: default_slow_dispatch_warn_ms(),
        }
    }
}

impl GeneralConfig {
    pub fn slow_dispatch_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_dispatch_warn_ms)
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

/// Directory holding `config.toml` on this platform.
///
/// # Errors
///
/// [`ConfigError::NoPlatformConfigDir`] if the environment names no base
/// directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// `config_dir()/config.toml`.
///
/// # Errors
///
/// Same as [`config_dir`].
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file exists but cannot be read;
/// [`ConfigError::Parse`] for malformed TOML or an unknown key name.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`ConfigError::Io`] if the directory or file cannot be written;
/// [`ConfigError::Serialize`] if encoding fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `InputGate`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("InputGate"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("inputgate"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("InputGate"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("inputgate_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_has_no_bindings_and_info_level() {
        let cfg = AppConfig::default();

        assert!(cfg.remap.is_empty());
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.general.slow_dispatch_threshold(), Duration::from_millis(50));
        assert!(!cfg.hooks.log_pointer_events);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_remap_entries_parse_key_names_in_file_order() {
        // Arrange
        let toml_str = r#"
[general]
log_level = "debug"

[[remap]]
source = "CapsLock"
target = "Escape"

[[remap]]
source = "a"
target = "0x42"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg.general.log_level, "debug");
        assert_eq!(cfg.general.slow_dispatch_warn_ms, 50);
        assert_eq!(
            cfg.remap,
            vec![
                BindingEntry {
                    source: KeyCode::CAPS_LOCK,
                    target: KeyCode::ESCAPE,
                },
                BindingEntry {
                    source: KeyCode::A,
                    target: KeyCode::B,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_key_name_is_a_parse_error() {
        let toml_str = r#"
[[remap]]
source = "NotAKey"
target = "A"
"#;

        let result: Result<AppConfig, toml::de::Error> = toml::from_str(toml_str);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = temp_path();

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        // Arrange
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_then_load_preserves_bindings() {
        // Arrange
        let path = temp_path();
        let mut cfg = AppConfig::default();
        cfg.hooks.log_pointer_events = true;
        cfg.remap.push(BindingEntry {
            source: KeyCode::RIGHT_ALT,
            target: KeyCode::LEFT_WIN,
        });

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("source = \"RightAlt\""), "keys are written by name: {text}");

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
        // NoPlatformConfigDir in a stripped environment is acceptable.
    }
}
