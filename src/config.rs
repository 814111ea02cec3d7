//! Configuration types for the version checker skill.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level skill configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Override for the running core version (`MAJOR.MINOR.BUILD`).
    ///
    /// When unset the crate version is reported.
    pub core_version: Option<String>,
    /// Directory for rolling log files. When unset, logs go to stderr only
    /// unless `--log-file` is passed.
    pub log_dir: Option<PathBuf>,
    /// Host message bus connection.
    pub bus: BusConfig,
    /// Release feed settings.
    pub release: ReleaseConfig,
    /// Daily check and notice debounce timing.
    pub schedule: ScheduleConfig,
    /// Host settings file locations.
    pub settings: SettingsConfig,
    /// Host OS identification files.
    pub host_files: HostFilesConfig,
}

/// Host message bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// WebSocket URL of the host message bus.
    pub url: String,
    /// First reconnect delay in milliseconds; doubles per failed attempt.
    pub reconnect_base_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds.
    pub reconnect_max_ms: u64,
    /// How long to wait for a spoken yes/no answer.
    pub answer_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8181/core".to_owned(),
            reconnect_base_ms: 500,
            reconnect_max_ms: 30_000,
            answer_timeout_secs: 15,
        }
    }
}

impl BusConfig {
    /// Answer timeout as a [`Duration`].
    #[must_use]
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

/// Release feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Endpoint returning the latest release as JSON with a `tag_name` field.
    pub feed_url: String,
    /// Prefix stripped from `tag_name` before parsing.
    pub tag_prefix: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// `User-Agent` header sent with feed requests.
    pub user_agent: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://api.github.com/repos/MycroftAI/mycroft-core/releases/latest"
                .to_owned(),
            tag_prefix: "release/v".to_owned(),
            request_timeout_secs: 15,
            user_agent: format!("version-checker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Timing of the daily check and the activity-debounced notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between release checks.
    pub check_interval_secs: u64,
    /// Seconds of quiet after host output before the update notice is spoken.
    pub notice_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 24 * 3600,
            notice_delay_secs: 30,
        }
    }
}

/// Shortest accepted interval between release checks.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest accepted quiet period before the update notice.
pub const MIN_NOTICE_DELAY: Duration = Duration::from_secs(1);

impl ScheduleConfig {
    /// Check interval as a [`Duration`], never below [`MIN_CHECK_INTERVAL`].
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs).max(MIN_CHECK_INTERVAL)
    }

    /// Notice delay as a [`Duration`], never below [`MIN_NOTICE_DELAY`].
    #[must_use]
    pub fn notice_delay(&self) -> Duration {
        Duration::from_secs(self.notice_delay_secs).max(MIN_NOTICE_DELAY)
    }
}

/// Host settings file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Read-only system layer.
    pub system_path: PathBuf,
    /// Writable user layer; overrides the system layer.
    pub user_path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            system_path: PathBuf::from(crate::skill_dirs::HOST_SYSTEM_SETTINGS_PATH),
            user_path: crate::skill_dirs::host_user_settings_path(),
        }
    }
}

/// Host OS identification files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostFilesConfig {
    /// Pre-login banner; the first line names the distribution.
    pub issue_path: PathBuf,
    /// `os-release` file; `VERSION_ID` is used when the banner is unusable.
    pub os_release_path: PathBuf,
}

impl Default for HostFilesConfig {
    fn default() -> Self {
        Self {
            issue_path: PathBuf::from("/etc/issue"),
            os_release_path: PathBuf::from("/etc/os-release"),
        }
    }
}

impl SkillConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::SkillError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no skill config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkillError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::skill_dirs::config_file()
    }

    /// The running core version: the configured override, else the crate version.
    ///
    /// # Errors
    ///
    /// Returns an error if the override is not a valid `MAJOR.MINOR.BUILD`.
    pub fn running_version(&self) -> crate::error::Result<crate::version::Version> {
        self.core_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .parse()
    }
}
