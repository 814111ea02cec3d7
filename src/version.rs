//! Core version triples and the persisted upgrade ceiling.
//!
//! A [`Version`] is `(major, minor, build)` compared lexicographically. The
//! consent ceiling stored in the host settings only records `major.minor`, so
//! decoded ceilings carry [`Build::Unbounded`], which sorts above every known
//! build number.

use crate::error::{Result, SkillError};
use std::fmt;
use std::str::FromStr;

/// Build component of a [`Version`].
///
/// Variant order matters: the derived `Ord` puts `Unbounded` above any
/// `Known` build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Build {
    /// A concrete build number.
    Known(u32),
    /// Any build of the given `major.minor`.
    Unbounded,
}

/// A core software version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: Build,
}

impl Version {
    /// Build a concrete version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build: Build::Known(build),
        }
    }

    /// Build a ceiling that admits every build of `major.minor`.
    #[must_use]
    pub const fn ceiling(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: Build::Unbounded,
        }
    }

    /// The same `major.minor` with the build lifted to unbounded.
    #[must_use]
    pub const fn as_ceiling(self) -> Self {
        Self::ceiling(self.major, self.minor)
    }

    /// `major.minor` as spoken in dialogs, e.g. `"18.8"`.
    #[must_use]
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            Build::Known(build) => write!(f, "{}.{}.{build}", self.major, self.minor),
            Build::Unbounded => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for Version {
    type Err = SkillError;

    /// Parse `"MAJOR.MINOR.BUILD"`.
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(SkillError::Version(format!(
                "expected MAJOR.MINOR.BUILD, got '{trimmed}'"
            )));
        }

        let component = |part: &str, name: &str| -> Result<u32> {
            part.parse::<u32>().map_err(|e| {
                SkillError::Version(format!("invalid {name} '{part}' in '{trimmed}': {e}"))
            })
        };

        Ok(Self::new(
            component(parts[0], "major")?,
            component(parts[1], "minor")?,
            component(parts[2], "build")?,
        ))
    }
}

/// Strip `prefix` from a release tag and parse the remainder.
///
/// `parse_release_tag("release/v18.8.4", "release/v")` yields `18.8.4`.
pub fn parse_release_tag(tag: &str, prefix: &str) -> Result<Version> {
    let rest = tag.trim().strip_prefix(prefix).ok_or_else(|| {
        SkillError::Version(format!("release tag '{tag}' does not start with '{prefix}'"))
    })?;
    rest.parse()
}

/// Encode a consent ceiling as the stored decimal `major + minor / 10`.
///
/// Minor versions of 10 or more collide with the next major in this format
/// and are rejected.
pub fn encode_allowed(version: &Version) -> Result<f64> {
    if version.minor > 9 {
        return Err(SkillError::Version(format!(
            "minor version {} of {} cannot be stored as a decimal ceiling",
            version.minor,
            version.major_minor()
        )));
    }
    Ok(f64::from(version.major) + f64::from(version.minor) / 10.0)
}

/// Decode the stored decimal ceiling into `major.minor` with unbounded build.
pub fn decode_allowed(value: f64) -> Result<Version> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(SkillError::Version(format!(
            "stored version ceiling {value} is out of range"
        )));
    }

    let major = value.trunc();
    // Rounding absorbs the binary error in values such as 18.8.
    let minor = ((value - major) * 10.0).round();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (major, minor) = (major as u32, minor as u32);

    if minor >= 10 {
        return Ok(Version::ceiling(major.saturating_add(1), 0));
    }
    Ok(Version::ceiling(major, minor))
}
