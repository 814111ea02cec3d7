//! WebSocket client for the host message bus.
//!
//! [`BusClient`] owns a background task that keeps a connection to the bus
//! open, reconnecting with exponential backoff. Outbound frames are queued on
//! an unbounded channel and survive reconnects; inbound frames are parsed and
//! fanned out on a broadcast channel. A fixed handshake (intent registration)
//! is replayed on every connect so the host relearns the skill after restarts.

use crate::config::BusConfig;
use crate::error::{Result, SkillError};
use crate::host::contract::BusMessage;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Inbound broadcast capacity.
const INBOUND_CAPACITY: usize = 256;

/// Connection state of the bus client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Closed,
}

/// Handle to the bus connection.
pub struct BusClient {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_tx: broadcast::Sender<BusMessage>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

/// Test-side end of a [`BusClient::loopback`] pair.
pub struct LoopbackPeer {
    /// Frames the client sent, as JSON text.
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Inject frames as if the host had sent them.
    pub inbound_tx: broadcast::Sender<BusMessage>,
}

impl LoopbackPeer {
    /// Drain and parse everything the client has sent so far.
    pub fn drain(&mut self) -> Vec<BusMessage> {
        let mut out = Vec::new();
        while let Ok(text) = self.outbound_rx.try_recv() {
            if let Ok(msg) = serde_json::from_str(&text) {
                out.push(msg);
            }
        }
        out
    }
}

impl BusClient {
    /// Start connecting to `config.url` in the background.
    ///
    /// `handshake` is sent first on every successful connect.
    pub fn connect(
        config: &BusConfig,
        handshake: Vec<BusMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _) = broadcast::channel(INBOUND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let link = Link {
            url: config.url.clone(),
            handshake,
            base_delay: Duration::from_millis(config.reconnect_base_ms.max(1)),
            max_delay: Duration::from_millis(config.reconnect_max_ms.max(1)),
            inbound_tx: inbound_tx.clone(),
            status_tx,
            cancel,
        };
        let task = tokio::spawn(link.run(outbound_rx));

        Self {
            outbound_tx,
            inbound_tx,
            status_rx,
            task: Some(task),
        }
    }

    /// A client wired to in-process channels instead of a socket.
    #[must_use]
    pub fn loopback() -> (Self, LoopbackPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _) = broadcast::channel(INBOUND_CAPACITY);
        let (_status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let client = Self {
            outbound_tx,
            inbound_tx: inbound_tx.clone(),
            status_rx,
            task: None,
        };
        (
            client,
            LoopbackPeer {
                outbound_rx,
                inbound_tx,
            },
        )
    }

    /// Queue a frame for the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized or the connection
    /// task has stopped.
    pub fn send(&self, message: &BusMessage) -> Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| SkillError::Bus(format!("cannot serialize {}: {e}", message.msg_type)))?;
        self.outbound_tx
            .send(json)
            .map_err(|_| SkillError::Channel("bus connection task has stopped".to_owned()))
    }

    /// Subscribe to inbound frames.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.inbound_tx.subscribe()
    }

    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Follow connection state changes.
    #[must_use]
    pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Wait for the connection task to finish (after cancellation).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

struct Link {
    url: String,
    handshake: Vec<BusMessage>,
    base_delay: Duration,
    max_delay: Duration,
    inbound_tx: broadcast::Sender<BusMessage>,
    status_tx: watch::Sender<ConnectionStatus>,
    cancel: CancellationToken,
}

/// Why a connection attempt ended.
struct Disconnect {
    reason: String,
    was_connected: bool,
}

impl Link {
    async fn run(self, mut outbound_rx: mpsc::UnboundedReceiver<String>) {
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.try_connect(&mut outbound_rx).await {
                Ok(()) => break,
                Err(disconnect) => {
                    if disconnect.was_connected {
                        attempt = 0;
                    }
                    attempt = attempt.saturating_add(1);
                    let delay = backoff_delay(self.base_delay, self.max_delay, attempt);
                    warn!(
                        url = %self.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "bus connection lost: {}",
                        disconnect.reason
                    );
                    let _ = self
                        .status_tx
                        .send(ConnectionStatus::Reconnecting { attempt });

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        let _ = self.status_tx.send(ConnectionStatus::Closed);
        info!("bus client stopped");
    }

    /// One connection lifetime. `Ok` only on cancellation.
    async fn try_connect(
        &self,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> std::result::Result<(), Disconnect> {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::{connect_async, tungstenite::Message};

        let (ws_stream, _) = connect_async(self.url.as_str()).await.map_err(|e| Disconnect {
            reason: format!("connect: {e}"),
            was_connected: false,
        })?;
        let (mut write, mut read) = ws_stream.split();

        for message in &self.handshake {
            let json = serde_json::to_string(message).map_err(|e| Disconnect {
                reason: format!("serialize handshake: {e}"),
                was_connected: false,
            })?;
            write.send(Message::Text(json)).await.map_err(|e| Disconnect {
                reason: format!("send handshake: {e}"),
                was_connected: false,
            })?;
        }

        let _ = self.status_tx.send(ConnectionStatus::Connected);
        info!(url = %self.url, "connected to host bus");

        let dropped = |reason: String| Disconnect {
            reason,
            was_connected: true,
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    // Flush what was queued before the close (detach frames).
                    while let Ok(json) = outbound_rx.try_recv() {
                        if write.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(dropped("connection closed by host".into()));
                    }
                    Some(Err(e)) => return Err(dropped(format!("read error: {e}"))),
                    _ => {}
                },
                Some(json) = outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(json)).await {
                        return Err(dropped(format!("send error: {e}")));
                    }
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<BusMessage>(text) {
            Ok(message) => {
                // No subscribers is fine; nothing is waiting for this frame.
                let _ = self.inbound_tx.send(message);
            }
            Err(e) => debug!("ignoring unparseable bus frame: {e}"),
        }
    }
}

/// `base * 2^attempt`, capped at `max`.
fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
        .min(max)
}
