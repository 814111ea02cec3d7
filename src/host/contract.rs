//! Message envelopes exchanged with the host runtime over its bus.
//!
//! Every frame is a JSON object `{"type": ..., "data": {...}, "context": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Skill identifier stamped into outbound message context and intent names.
pub const SKILL_ID: &str = "VersionCheckerSkill";

/// Message types the skill sends or listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Speak,
    MouthText,
    SystemUpdate,
    ConfigurationUpdated,
    RegisterVocab,
    RegisterIntent,
    DetachIntent,
    AudioOutputStart,
    AudioOutputEnd,
    Utterance,
    Stop,
}

impl MessageType {
    /// Render to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speak => "speak",
            Self::MouthText => "enclosure.mouth.text",
            Self::SystemUpdate => "system.update",
            Self::ConfigurationUpdated => "configuration.updated",
            Self::RegisterVocab => "register_vocab",
            Self::RegisterIntent => "register_intent",
            Self::DetachIntent => "detach_intent",
            Self::AudioOutputStart => "recognizer_loop:audio_output_start",
            Self::AudioOutputEnd => "recognizer_loop:audio_output_end",
            Self::Utterance => "recognizer_loop:utterance",
            Self::Stop => "mycroft.stop",
        }
    }

    /// Parse from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "speak" => Some(Self::Speak),
            "enclosure.mouth.text" => Some(Self::MouthText),
            "system.update" => Some(Self::SystemUpdate),
            "configuration.updated" => Some(Self::ConfigurationUpdated),
            "register_vocab" => Some(Self::RegisterVocab),
            "register_intent" => Some(Self::RegisterIntent),
            "detach_intent" => Some(Self::DetachIntent),
            "recognizer_loop:audio_output_start" => Some(Self::AudioOutputStart),
            "recognizer_loop:audio_output_end" => Some(Self::AudioOutputEnd),
            "recognizer_loop:utterance" => Some(Self::Utterance),
            "mycroft.stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// One bus frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub context: Value,
}

impl BusMessage {
    /// Build an outbound message with the skill's context.
    #[must_use]
    pub fn new(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
            context: json!({ "source": SKILL_ID }),
        }
    }

    /// Build an outbound message of a known type.
    #[must_use]
    pub fn of(kind: MessageType, data: Value) -> Self {
        Self::new(kind.as_str(), data)
    }

    /// Ask the host to speak `utterance`, optionally opening the microphone after.
    #[must_use]
    pub fn speak(utterance: &str, expect_response: bool) -> Self {
        Self::of(
            MessageType::Speak,
            json!({ "utterance": utterance, "expect_response": expect_response }),
        )
    }

    /// Show `text` on the device display.
    #[must_use]
    pub fn mouth_text(text: &str) -> Self {
        Self::of(MessageType::MouthText, json!({ "text": text }))
    }

    /// Trigger a system upgrade.
    #[must_use]
    pub fn system_update(paired: bool, platform: &str) -> Self {
        Self::of(
            MessageType::SystemUpdate,
            json!({ "paired": paired, "platform": platform }),
        )
    }

    /// Tell other processes to reload settings.
    #[must_use]
    pub fn configuration_updated() -> Self {
        Self::of(MessageType::ConfigurationUpdated, json!({}))
    }

    /// Known type of this message, if any.
    #[must_use]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::parse(&self.msg_type)
    }

    /// First transcription carried by a `recognizer_loop:utterance` message.
    #[must_use]
    pub fn first_utterance(&self) -> Option<&str> {
        self.data
            .get("utterances")?
            .as_array()?
            .first()?
            .as_str()
    }
}
