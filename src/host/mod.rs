//! Host runtime integration.
//!
//! The skill talks to the host only through the [`Host`] trait. The
//! production implementation, [`bus_host::BusHost`], maps each call onto
//! bus messages carried by [`client::BusClient`].

pub mod bus_host;
pub mod client;
pub mod contract;

use crate::dialog::{Answer, Dialog};
use async_trait::async_trait;
use contract::BusMessage;

/// Output and event capabilities supplied by the host runtime.
#[async_trait]
pub trait Host: Send {
    /// Speak a line.
    async fn speak(&mut self, dialog: Dialog);

    /// Show short text on the device display.
    async fn display_text(&mut self, text: &str);

    /// Speak a question and wait for a yes/no reply.
    async fn ask_yes_no(&mut self, question: Dialog) -> Answer;

    /// Emit a raw bus event.
    async fn emit(&mut self, message: BusMessage);

    /// Whether the host is producing speech right now.
    fn is_speaking(&self) -> bool;
}
