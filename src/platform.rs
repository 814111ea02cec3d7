//! Device platform classification and host OS identification.

use crate::error::{Result, SkillError};
use std::path::Path;

/// Device platform as named by the host's `enclosure.platform` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MarkOne,
    MarkTwo,
    Picroft,
    /// Any other named platform (desktop installs, custom builds).
    Other(String),
    /// No platform configured.
    Unknown,
}

/// Where to point the user when no automatic upgrade path exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualGuidance {
    /// Update from the device's own settings screen.
    DeviceSettings,
    /// Source checkout: pull and rerun the setup script.
    SourceCheckout,
    /// Unknown install type: use the system package manager.
    PackageManager,
}

impl Platform {
    /// Classify the raw setting value.
    #[must_use]
    pub fn from_setting(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Unknown,
            Some("mycroft_mark_1") => Self::MarkOne,
            Some("mycroft_mark_2") => Self::MarkTwo,
            Some("picroft") => Self::Picroft,
            Some(other) => Self::Other(other.to_owned()),
        }
    }

    /// Identifier sent with `system.update`.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::MarkOne => "mycroft_mark_1",
            Self::MarkTwo => "mycroft_mark_2",
            Self::Picroft => "picroft",
            Self::Other(name) => name,
            Self::Unknown => "unknown",
        }
    }

    /// Dedicated device images, as opposed to generic Linux hosts.
    #[must_use]
    pub fn is_appliance(&self) -> bool {
        matches!(self, Self::MarkOne | Self::MarkTwo | Self::Picroft)
    }

    /// Whether the host can perform the upgrade itself on `system.update`.
    #[must_use]
    pub fn supports_auto_upgrade(&self) -> bool {
        matches!(self, Self::MarkOne | Self::Picroft)
    }

    /// Manual-update instructions for this platform.
    #[must_use]
    pub fn manual_guidance(&self) -> ManualGuidance {
        match self {
            Self::MarkOne | Self::MarkTwo | Self::Picroft => ManualGuidance::DeviceSettings,
            Self::Other(_) => ManualGuidance::SourceCheckout,
            Self::Unknown => ManualGuidance::PackageManager,
        }
    }
}

/// One-line description of the host operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsIdentity {
    /// First line of the pre-login banner, escapes removed.
    Banner(String),
    /// `VERSION_ID` from `os-release`.
    VersionId(String),
}

/// Identify the host OS from the banner, falling back to `os-release`.
///
/// # Errors
///
/// Returns an error when neither file yields a usable value.
pub fn read_os_identity(issue_path: &Path, os_release_path: &Path) -> Result<OsIdentity> {
    let banner_err = match std::fs::read_to_string(issue_path) {
        Ok(contents) => match banner_line(&contents) {
            Some(line) => return Ok(OsIdentity::Banner(line)),
            None => format!("{} has no usable first line", issue_path.display()),
        },
        Err(e) => format!("cannot read {}: {e}", issue_path.display()),
    };

    let contents = std::fs::read_to_string(os_release_path).map_err(|e| {
        SkillError::Io(std::io::Error::new(
            e.kind(),
            format!("{banner_err}; cannot read {}: {e}", os_release_path.display()),
        ))
    })?;

    os_release_field(&contents, "VERSION_ID")
        .map(OsIdentity::VersionId)
        .ok_or_else(|| {
            SkillError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{banner_err}; no VERSION_ID in {}", os_release_path.display()),
            ))
        })
}

/// First banner line without getty escapes such as `\n` and `\l`.
fn banner_line(contents: &str) -> Option<String> {
    let first = contents.lines().next()?;
    let cleaned: Vec<&str> = first
        .split_whitespace()
        .filter(|token| !token.starts_with('\\'))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(" "))
    }
}

/// Value of `key` in a shell-style `KEY=value` file, quotes removed.
fn os_release_field(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        if k.trim() != key {
            return None;
        }
        let value = v.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_owned())
    })
}
