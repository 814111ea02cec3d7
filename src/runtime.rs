//! Process wiring: bus connection, inbound routing and the skill task.
//!
//! ```text
//! host bus ──ws──► BusClient ──broadcast──► router ──SkillEvent──► skill task
//!                     ▲                                               │
//!                     └──────────────── BusHost (speak/emit) ◄────────┘
//! ```

use crate::config::SkillConfig;
use crate::error::Result;
use crate::host::bus_host::{BusHost, SpeechState};
use crate::host::client::{BusClient, ConnectionStatus};
use crate::host::contract::{BusMessage, MessageType};
use crate::intents::{self, Intent};
use crate::platform::{OsIdentity, Platform, read_os_identity};
use crate::release::{HttpReleaseFeed, ReleaseFeed};
use crate::settings::{LayeredSettings, SettingsStore};
use crate::skill::{SkillEvent, VersionCheckerSkill};
use crate::version::{Version, decode_allowed};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Map an inbound bus frame to the skill event it triggers, if any.
#[must_use]
pub fn event_for(message: &BusMessage) -> Option<SkillEvent> {
    if let Some(intent) = Intent::from_message_type(&message.msg_type) {
        return Some(SkillEvent::Intent(intent));
    }
    match message.kind() {
        Some(MessageType::AudioOutputEnd) => Some(SkillEvent::OutputFinished),
        Some(MessageType::Stop) => Some(SkillEvent::Stop),
        _ => None,
    }
}

/// Forward inbound frames: update speech state, then post skill events.
pub async fn route_bus_messages(
    mut inbound: broadcast::Receiver<BusMessage>,
    speech: SpeechState,
    events: mpsc::UnboundedSender<SkillEvent>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            received = inbound.recv() => match received {
                Ok(message) => message,
                Err(RecvError::Lagged(n)) => {
                    warn!(lagged = n, "router fell behind the bus, frames dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        speech.observe(&message);
        if let Some(event) = event_for(&message) {
            debug!(msg_type = %message.msg_type, "routing bus frame to skill");
            if events.send(event).is_err() {
                break;
            }
        }
    }
    debug!("bus router stopped");
}

/// Clear the speaking flag whenever the bus (re)connects.
///
/// Frames sent while the link was down are lost, including the
/// `recognizer_loop:audio_output_end` that would have cleared it.
pub async fn reset_speech_on_connect(
    mut status: watch::Receiver<ConnectionStatus>,
    speech: SpeechState,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                if *status.borrow_and_update() == ConnectionStatus::Connected
                    && speech.is_speaking()
                {
                    debug!("bus reconnected, clearing speaking flag");
                    speech.reset();
                }
            }
        }
    }
}

/// Run the skill against the configured bus until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the running version or the release feed
/// configuration is invalid.
pub async fn run(config: &SkillConfig, shutdown: CancellationToken) -> Result<()> {
    let current = config.running_version()?;
    let feed = HttpReleaseFeed::new(&config.release)?;
    let settings = LayeredSettings::from_config(&config.settings);

    // The bus outlives the skill so the detach frames still go out.
    let bus_cancel = CancellationToken::new();
    let client = BusClient::connect(
        &config.bus,
        intents::registration_messages(),
        bus_cancel.clone(),
    );
    let speech = SpeechState::default();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let router_cancel = CancellationToken::new();
    let router = tokio::spawn(route_bus_messages(
        client.subscribe(),
        speech.clone(),
        events_tx.clone(),
        router_cancel.clone(),
    ));
    tokio::spawn(reset_speech_on_connect(
        client.status_updates(),
        speech.clone(),
        router_cancel.clone(),
    ));

    let shutdown_tx = events_tx.clone();
    let watcher_shutdown = shutdown.clone();
    tokio::spawn(async move {
        watcher_shutdown.cancelled().await;
        let _ = shutdown_tx.send(SkillEvent::Shutdown);
    });

    let host = BusHost::new(client, speech, config.bus.answer_timeout());
    let skill = VersionCheckerSkill::new(
        host,
        feed,
        settings,
        current,
        events_tx,
        shutdown.child_token(),
    )
    .with_schedule(config.schedule.clone())
    .with_host_files(config.host_files.clone());

    info!(
        bus = %config.bus.url,
        feed = %config.release.feed_url,
        current = %current,
        "starting version checker"
    );
    let host = skill.run(events_rx).await;

    router_cancel.cancel();
    let _ = router.await;
    bus_cancel.cancel();
    host.into_client().join().await;
    Ok(())
}

/// Versions as the skill sees them, for the `check` command.
#[derive(Debug, Clone)]
pub struct VersionReport {
    pub current: Version,
    pub latest: Option<Version>,
    pub allowed: Version,
}

/// Fetch the latest release once and resolve the consent ceiling.
///
/// # Errors
///
/// Returns an error if the running version or the release feed
/// configuration is invalid. Feed failures are reported as `latest: None`.
pub async fn version_report(config: &SkillConfig) -> Result<VersionReport> {
    let current = config.running_version()?;
    let feed = HttpReleaseFeed::new(&config.release)?;
    let settings = LayeredSettings::from_config(&config.settings);

    let latest = match feed.latest_version().await {
        Ok(latest) => Some(latest),
        Err(e) => {
            warn!(error = %e, "release check failed");
            None
        }
    };
    let allowed = settings
        .max_allowed_core_version()?
        .map(decode_allowed)
        .transpose()?
        .unwrap_or_else(|| current.as_ceiling());

    Ok(VersionReport {
        current,
        latest,
        allowed,
    })
}

/// Host identity, for the `platform` command.
#[derive(Debug, Clone)]
pub struct PlatformReport {
    pub platform: Platform,
    pub build: Option<String>,
    pub os: Option<OsIdentity>,
}

/// Read platform settings and OS identification files.
#[must_use]
pub fn platform_report(config: &SkillConfig) -> PlatformReport {
    let settings = LayeredSettings::from_config(&config.settings);
    let os = match read_os_identity(
        &config.host_files.issue_path,
        &config.host_files.os_release_path,
    ) {
        Ok(identity) => Some(identity),
        Err(e) => {
            debug!(error = %e, "no OS identification available");
            None
        }
    };
    PlatformReport {
        platform: Platform::from_setting(settings.platform().as_deref()),
        build: settings.platform_build(),
        os,
    }
}
