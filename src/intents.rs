//! Voice intents and their keyword vocabulary.
//!
//! The host's intent engine does the matching; the skill only registers
//! keywords and keyword-based intents, then listens for the intent's message
//! type (`VersionCheckerSkill:<IntentName>`).

use crate::host::contract::{BusMessage, MessageType, SKILL_ID};
use serde_json::json;

/// Keyword vocabularies: `(keyword type, phrases)`.
const VOCABULARY: &[(&str, &[&str])] = &[
    ("CheckKeyword", &["check", "what", "what's", "which", "tell me", "say"]),
    ("VersionKeyword", &["version", "release"]),
    (
        "PlatformBuildKeyword",
        &["platform build", "firmware", "platform version", "build number"],
    ),
];

/// Intents handled by the skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CheckVersion,
    CheckPlatformBuild,
}

impl Intent {
    pub const ALL: [Self; 2] = [Self::CheckVersion, Self::CheckPlatformBuild];

    /// Bare intent name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CheckVersion => "CheckVersion",
            Self::CheckPlatformBuild => "CheckPlatformBuild",
        }
    }

    /// Keyword types that must all be present in the utterance.
    #[must_use]
    pub fn required_keywords(self) -> &'static [&'static str] {
        match self {
            Self::CheckVersion => &["CheckKeyword", "VersionKeyword"],
            Self::CheckPlatformBuild => &["CheckKeyword", "PlatformBuildKeyword"],
        }
    }

    /// Message type the host emits when this intent matches.
    #[must_use]
    pub fn message_type(self) -> String {
        format!("{SKILL_ID}:{}", self.name())
    }

    /// Resolve an inbound message type to an intent.
    #[must_use]
    pub fn from_message_type(raw: &str) -> Option<Self> {
        let name = raw.strip_prefix(SKILL_ID)?.strip_prefix(':')?;
        Self::ALL.into_iter().find(|intent| intent.name() == name)
    }

    fn register_message(self) -> BusMessage {
        let requires: Vec<[&str; 2]> = self
            .required_keywords()
            .iter()
            .map(|kw| [*kw, *kw])
            .collect();
        BusMessage::of(
            MessageType::RegisterIntent,
            json!({
                "name": self.message_type(),
                "requires": requires,
                "at_least_one": [],
                "optional": [],
            }),
        )
    }
}

/// Frames that teach the host the skill's vocabulary and intents.
#[must_use]
pub fn registration_messages() -> Vec<BusMessage> {
    let vocab = VOCABULARY.iter().flat_map(|(keyword_type, phrases)| {
        phrases.iter().map(move |phrase| {
            BusMessage::of(
                MessageType::RegisterVocab,
                json!({ "start": phrase, "end": keyword_type }),
            )
        })
    });
    vocab
        .chain(Intent::ALL.into_iter().map(Intent::register_message))
        .collect()
}

/// Frames that withdraw the skill's intents at shutdown.
#[must_use]
pub fn detach_messages() -> Vec<BusMessage> {
    Intent::ALL
        .into_iter()
        .map(|intent| {
            BusMessage::of(
                MessageType::DetachIntent,
                json!({ "intent_name": intent.message_type() }),
            )
        })
        .collect()
}
