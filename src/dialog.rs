//! Spoken lines and yes/no answer classification.

use crate::platform::{ManualGuidance, OsIdentity};

/// Everything the skill says to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Version { version: String },
    LatestVersion,
    CheckFailed,
    AheadOfRelease { latest: String },
    MajorUpgradeAsk { version: String },
    UpgradeAsk { version: String },
    UpgradeStarted,
    UpgradeDeclined { version: String },
    UpgradeCancelled,
    ManualUpdate { version: String, guidance: ManualGuidance },
    PlatformBuild { build: String },
    PlatformBuildNone,
    Os(OsIdentity),
}

impl Dialog {
    /// Stable identifier, used for logging and by tests.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Version { .. } => "version",
            Self::LatestVersion => "version.latest",
            Self::CheckFailed => "version.check.failed",
            Self::AheadOfRelease { .. } => "version.ahead",
            Self::MajorUpgradeAsk { .. } => "upgrade.major.ask",
            Self::UpgradeAsk { .. } => "upgrade.ask",
            Self::UpgradeStarted => "upgrade.started",
            Self::UpgradeDeclined { .. } => "upgrade.declined",
            Self::UpgradeCancelled => "upgrade.cancelled",
            Self::ManualUpdate { .. } => "upgrade.manual",
            Self::PlatformBuild { .. } => "platform.build",
            Self::PlatformBuildNone => "platform.build.none",
            Self::Os(_) => "platform.os",
        }
    }

    /// Render the sentence handed to the host's text-to-speech.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Version { version } => format!("I am running core version {version}."),
            Self::LatestVersion => "That is the latest version.".to_owned(),
            Self::CheckFailed => {
                "I couldn't reach the release server, so I can't tell whether an update is available."
                    .to_owned()
            }
            Self::AheadOfRelease { latest } => {
                format!("This build is newer than the latest published release, {latest}.")
            }
            Self::MajorUpgradeAsk { version } => format!(
                "Version {version} is available. It is a major upgrade. Would you like me to install it now?"
            ),
            Self::UpgradeAsk { version } => {
                format!("Version {version} is available. Would you like to upgrade now?")
            }
            Self::UpgradeStarted => {
                "Starting the upgrade. I will be unavailable for a few minutes.".to_owned()
            }
            Self::UpgradeDeclined { version } => {
                format!("Okay, I will stay on the current version instead of {version}.")
            }
            Self::UpgradeCancelled => "Upgrade cancelled.".to_owned(),
            Self::ManualUpdate { version, guidance } => {
                let how = match guidance {
                    ManualGuidance::DeviceSettings => {
                        "You can install it from the update page in my device settings."
                    }
                    ManualGuidance::SourceCheckout => {
                        "Pull the latest code and run the setup script again to install it."
                    }
                    ManualGuidance::PackageManager => {
                        "Use your system's package manager to install it."
                    }
                };
                format!("Version {version} is available. {how}")
            }
            Self::PlatformBuild { build } => format!("My platform build is {build}."),
            Self::PlatformBuildNone => "I don't have a platform build.".to_owned(),
            Self::Os(OsIdentity::Banner(banner)) => format!("I am running on {banner}."),
            Self::Os(OsIdentity::VersionId(id)) => {
                format!("My operating system version is {id}.")
            }
        }
    }
}

/// Outcome of a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Anything else, including silence.
    Unclear,
}

impl Answer {
    /// Only an explicit yes counts as consent.
    #[must_use]
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

const YES_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "please", "affirmative", "absolutely",
];
const NO_WORDS: &[&str] = &[
    "no", "nope", "nah", "cancel", "don't", "dont", "stop", "negative", "never", "later",
];
const YES_PHRASES: &[&str] = &["do it", "go ahead"];
const NO_PHRASES: &[&str] = &["not now", "no thanks"];

/// Classify a transcribed reply. Negatives win over affirmatives.
#[must_use]
pub fn classify_answer(utterance: &str) -> Answer {
    let normalized: String = utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let joined = words.join(" ");

    let has_word = |vocab: &[&str]| words.iter().any(|w| vocab.contains(w));
    let has_phrase = |vocab: &[&str]| vocab.iter().any(|p| joined.contains(p));

    if has_word(NO_WORDS) || has_phrase(NO_PHRASES) {
        Answer::No
    } else if has_word(YES_WORDS) || has_phrase(YES_PHRASES) {
        Answer::Yes
    } else {
        Answer::Unclear
    }
}
