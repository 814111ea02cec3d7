//! Filesystem locations used by the skill.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/version-checker/` | `~/.config/version-checker/` |
//! | Data (logs) | `~/Library/Application Support/version-checker/` | `~/.local/share/version-checker/` |
//!
//! Overrides: `VERSION_CHECKER_CONFIG_DIR`, `VERSION_CHECKER_DATA_DIR`.
//!
//! The host settings files live under the host's own directory
//! (`~/.config/mycroft/` for the user layer, `/etc/mycroft/` for the system
//! layer) and are addressed through [`host_user_settings_path`] and
//! [`HOST_SYSTEM_SETTINGS_PATH`].

use std::path::PathBuf;

const APP_DIR: &str = "version-checker";

/// System-wide host settings, read only.
pub const HOST_SYSTEM_SETTINGS_PATH: &str = "/etc/mycroft/mycroft.toml";

/// Skill config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VERSION_CHECKER_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/version-checker-config"))
}

/// Skill data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VERSION_CHECKER_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/version-checker-data"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Skill config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// User-level host settings file that receives the consent ceiling.
#[must_use]
pub fn host_user_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("mycroft").join("mycroft.toml"))
        .unwrap_or_else(|| PathBuf::from("/tmp/mycroft/mycroft.toml"))
}
