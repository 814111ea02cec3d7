//! [`Host`] implementation over the message bus.

use crate::dialog::{Answer, Dialog, classify_answer};
use crate::host::Host;
use crate::host::client::BusClient;
use crate::host::contract::{BusMessage, MessageType};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Whether the host is currently playing speech, derived from
/// `recognizer_loop:audio_output_start` / `_end` frames.
#[derive(Debug, Clone, Default)]
pub struct SpeechState(Arc<AtomicBool>);

impl SpeechState {
    /// Update from an inbound frame; other frame types are ignored.
    pub fn observe(&self, message: &BusMessage) {
        match message.kind() {
            Some(MessageType::AudioOutputStart) => self.0.store(true, Ordering::SeqCst),
            Some(MessageType::AudioOutputEnd) => self.0.store(false, Ordering::SeqCst),
            _ => {}
        }
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Forget any output in progress; an end frame may have been lost.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Host capabilities backed by bus messages.
pub struct BusHost {
    client: BusClient,
    speech: SpeechState,
    answer_timeout: Duration,
}

impl BusHost {
    pub fn new(client: BusClient, speech: SpeechState, answer_timeout: Duration) -> Self {
        Self {
            client,
            speech,
            answer_timeout,
        }
    }

    fn send(&self, message: &BusMessage) {
        if let Err(e) = self.client.send(message) {
            warn!(msg_type = %message.msg_type, error = %e, "dropping outbound bus message");
        }
    }

    /// Release the underlying client (used at shutdown).
    #[must_use]
    pub fn into_client(self) -> BusClient {
        self.client
    }
}

#[async_trait]
impl Host for BusHost {
    async fn speak(&mut self, dialog: Dialog) {
        debug!(dialog = dialog.id(), "speak");
        self.send(&BusMessage::speak(&dialog.render(), false));
    }

    async fn display_text(&mut self, text: &str) {
        self.send(&BusMessage::mouth_text(text));
    }

    async fn ask_yes_no(&mut self, question: Dialog) -> Answer {
        // Subscribe before asking so a fast reply is not missed.
        let mut inbound = self.client.subscribe();
        debug!(dialog = question.id(), "asking yes/no question");
        self.send(&BusMessage::speak(&question.render(), true));

        let wait = async {
            loop {
                match inbound.recv().await {
                    Ok(msg) if msg.kind() == Some(MessageType::Utterance) => {
                        return msg.first_utterance().map(classify_answer);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged = n, "bus receiver lagged while waiting for answer");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        };

        match tokio::time::timeout(self.answer_timeout, wait).await {
            Ok(Some(answer)) => answer,
            Ok(None) => Answer::Unclear,
            Err(_) => {
                info!(
                    timeout_secs = self.answer_timeout.as_secs(),
                    "no answer before timeout"
                );
                Answer::Unclear
            }
        }
    }

    async fn emit(&mut self, message: BusMessage) {
        self.send(&message);
    }

    fn is_speaking(&self) -> bool {
        self.speech.is_speaking()
    }
}
