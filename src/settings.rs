//! Host settings access: the consent ceiling and platform identification.
//!
//! The host keeps its settings in two TOML layers. The system layer is
//! provisioned with the device image and never written here; the user layer
//! overrides it and receives `max_allowed_core_version`. Writes go through
//! `toml_edit` so comments and keys owned by other components survive.

use crate::error::{Result, SkillError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key holding the stored consent ceiling.
pub const KEY_MAX_ALLOWED_VERSION: &str = "max_allowed_core_version";
/// Key naming the device platform.
pub const KEY_PLATFORM: &str = "enclosure.platform";
/// Key holding the platform (firmware) build string.
pub const KEY_PLATFORM_BUILD: &str = "enclosure.platform_build";
/// Key recording whether the device is paired with its backend.
pub const KEY_PAIRED: &str = "identity.paired";

/// Settings the skill reads and the single value it writes.
pub trait SettingsStore: Send {
    /// Stored ceiling as the raw decimal, `None` when consent was never given.
    fn max_allowed_core_version(&self) -> Result<Option<f64>>;

    /// Persist a new ceiling decimal in the user layer.
    fn set_max_allowed_core_version(&mut self, value: f64) -> Result<()>;

    /// Platform identifier such as `mycroft_mark_1`.
    fn platform(&self) -> Option<String>;

    /// Platform (firmware) build string.
    fn platform_build(&self) -> Option<String>;

    /// Whether the device is paired with its backend.
    fn is_paired(&self) -> bool;
}

/// System + user TOML settings files, re-read on every access.
#[derive(Debug, Clone)]
pub struct LayeredSettings {
    system_path: PathBuf,
    user_path: PathBuf,
}

impl LayeredSettings {
    /// Create a store over the given layers. Neither file needs to exist.
    pub fn new(system_path: impl Into<PathBuf>, user_path: impl Into<PathBuf>) -> Self {
        Self {
            system_path: system_path.into(),
            user_path: user_path.into(),
        }
    }

    /// Build from the skill's settings section.
    #[must_use]
    pub fn from_config(config: &crate::config::SettingsConfig) -> Self {
        Self::new(&config.system_path, &config.user_path)
    }

    /// Look a dotted key up in the user layer, then the system layer.
    ///
    /// An unreadable layer is skipped with a warning.
    fn lookup(&self, key_path: &str) -> Option<toml::Value> {
        [&self.user_path, &self.system_path]
            .into_iter()
            .find_map(|path| match read_layer(path) {
                Ok(Some(table)) => resolve(&table, key_path).cloned(),
                Ok(None) => None,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable settings layer");
                    None
                }
            })
    }

    fn lookup_string(&self, key_path: &str) -> Option<String> {
        match self.lookup(key_path)? {
            toml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            toml::Value::String(_) => None,
            other => {
                warn!(key = key_path, value = %other, "settings value is not a string");
                None
            }
        }
    }
}

impl SettingsStore for LayeredSettings {
    fn max_allowed_core_version(&self) -> Result<Option<f64>> {
        match self.lookup(KEY_MAX_ALLOWED_VERSION) {
            None => Ok(None),
            Some(toml::Value::Float(f)) => Ok(Some(f)),
            #[allow(clippy::cast_precision_loss)]
            Some(toml::Value::Integer(i)) => Ok(Some(i as f64)),
            Some(other) => Err(SkillError::Settings(format!(
                "{KEY_MAX_ALLOWED_VERSION} must be a number, found {other}"
            ))),
        }
    }

    fn set_max_allowed_core_version(&mut self, value: f64) -> Result<()> {
        let mut editor = SettingsEditor::load_or_empty(&self.user_path)?;
        editor.set_float(KEY_MAX_ALLOWED_VERSION, value)?;
        editor.save()?;
        debug!(path = %self.user_path.display(), value, "stored version ceiling");
        Ok(())
    }

    fn platform(&self) -> Option<String> {
        self.lookup_string(KEY_PLATFORM)
    }

    fn platform_build(&self) -> Option<String> {
        self.lookup_string(KEY_PLATFORM_BUILD)
    }

    fn is_paired(&self) -> bool {
        matches!(self.lookup(KEY_PAIRED), Some(toml::Value::Boolean(true)))
    }
}

/// Parse one layer. A missing file is `Ok(None)`.
fn read_layer(path: &Path) -> Result<Option<toml::Table>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SkillError::Settings(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };
    contents
        .parse::<toml::Table>()
        .map(Some)
        .map_err(|e| SkillError::Settings(format!("cannot parse {}: {e}", path.display())))
}

fn resolve<'a>(table: &'a toml::Table, key_path: &str) -> Option<&'a toml::Value> {
    let mut parts = key_path.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Round-trip editor for the writable settings layer.
struct SettingsEditor {
    doc: toml_edit::DocumentMut,
    path: PathBuf,
}

impl SettingsEditor {
    fn load_or_empty(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(SkillError::Settings(format!(
                    "failed to read settings file '{}': {e}",
                    path.display()
                )));
            }
        };
        let doc: toml_edit::DocumentMut = contents.parse().map_err(|e| {
            SkillError::Settings(format!(
                "failed to parse settings file '{}': {e}",
                path.display()
            ))
        })?;
        Ok(Self {
            doc,
            path: path.to_path_buf(),
        })
    }

    fn set_float(&mut self, key_path: &str, value: f64) -> Result<()> {
        let parts: Vec<&str> = key_path.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(SkillError::Settings("empty key path".into()));
        };

        let mut current: &mut toml_edit::Item = self.doc.as_item_mut();
        for part in parents {
            if current.get(part).is_none() {
                current[part] = toml_edit::Item::Table(toml_edit::Table::new());
            }
            current = &mut current[part];
        }
        current[*last] = toml_edit::value(value);
        Ok(())
    }

    /// Write atomically via a sibling temp file.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SkillError::Settings(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let tmp_path = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, self.doc.to_string().as_bytes())
            .map_err(|e| SkillError::Settings(format!("failed to write temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| SkillError::Settings(format!("failed to rename temp file: {e}")))
    }
}
