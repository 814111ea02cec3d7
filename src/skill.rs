//! The version checker skill: version reports, upgrade consent and the
//! activity-debounced daily update notice.
//!
//! All work happens on one task that drains a [`SkillEvent`] channel, so the
//! skill's state is plain fields behind `&mut self`.
//!
//! Daily cycle:
//! 1. the repeating daily timer refreshes the latest release;
//! 2. if it exceeds the consent ceiling, the skill starts listening for the
//!    host's "output finished" signal instead of interrupting;
//! 3. each such signal (re)arms a short notice timer and restarts the daily
//!    cadence from that moment;
//! 4. when the notice timer fires while the host is quiet the user is asked;
//!    if the host is still talking the notice is pushed back again.

use crate::config::{HostFilesConfig, ScheduleConfig};
use crate::dialog::Dialog;
use crate::error::Result;
use crate::host::Host;
use crate::host::contract::BusMessage;
use crate::intents::{self, Intent};
use crate::platform::{Platform, read_os_identity};
use crate::release::ReleaseFeed;
use crate::settings::SettingsStore;
use crate::timers::{TimerRegistry, TimerTick};
use crate::version::{Version, decode_allowed, encode_allowed};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Repeating timer that refreshes the latest release.
pub const DAILY_CHECK_TIMER: &str = "version_checker.daily_check";
/// One-shot timer that delivers the update notice.
pub const QUEUE_NOTICE_TIMER: &str = "version_checker.queue_notice";

/// Work items for the skill task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillEvent {
    /// A registered intent matched.
    Intent(Intent),
    /// A named timer fired.
    Timer(TimerTick),
    /// The host finished playing output.
    OutputFinished,
    /// The host asked every skill to stop what it is doing.
    Stop,
    /// Detach from the host and end the event loop.
    Shutdown,
}

impl From<TimerTick> for SkillEvent {
    fn from(tick: TimerTick) -> Self {
        Self::Timer(tick)
    }
}

/// The skill and its collaborators.
pub struct VersionCheckerSkill<H, F, S> {
    host: H,
    feed: F,
    settings: S,
    current: Version,
    latest: Option<Version>,
    timers: TimerRegistry<SkillEvent>,
    schedule: ScheduleConfig,
    host_files: HostFilesConfig,
    activity_armed: bool,
}

impl<H, F, S> VersionCheckerSkill<H, F, S>
where
    H: Host,
    F: ReleaseFeed,
    S: SettingsStore,
{
    /// Create the skill. Timer ticks are posted to `events`.
    pub fn new(
        host: H,
        feed: F,
        settings: S,
        current: Version,
        events: mpsc::UnboundedSender<SkillEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host,
            feed,
            settings,
            current,
            latest: None,
            timers: TimerRegistry::new(events, cancel),
            schedule: ScheduleConfig::default(),
            host_files: HostFilesConfig::default(),
            activity_armed: false,
        }
    }

    /// Override check interval and notice delay.
    #[must_use]
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    /// Override the OS identification file paths.
    #[must_use]
    pub fn with_host_files(mut self, host_files: HostFilesConfig) -> Self {
        self.host_files = host_files;
        self
    }

    /// Latest release seen so far, if the feed was ever reachable.
    #[must_use]
    pub fn latest_version(&self) -> Option<Version> {
        self.latest
    }

    /// Whether the skill is waiting for host output to finish.
    #[must_use]
    pub fn is_activity_listener_armed(&self) -> bool {
        self.activity_armed
    }

    /// Whether an update notice is scheduled.
    #[must_use]
    pub fn is_notice_pending(&self) -> bool {
        self.timers.is_scheduled(QUEUE_NOTICE_TIMER)
    }

    /// Whether the daily check is scheduled.
    #[must_use]
    pub fn is_daily_check_scheduled(&self) -> bool {
        self.timers.is_scheduled(DAILY_CHECK_TIMER)
    }

    /// Start the daily check, first run immediately.
    pub fn initialize(&mut self) {
        self.timers.schedule_repeating(
            DAILY_CHECK_TIMER,
            std::time::Duration::ZERO,
            self.schedule.check_interval(),
        );
    }

    /// Drain events until shutdown or until every sender is gone.
    /// Returns the host so the caller can close its transport.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SkillEvent>) -> H {
        self.initialize();
        info!(current = %self.current, "version checker running");

        while let Some(event) = events.recv().await {
            if !self.handle(event).await {
                break;
            }
        }

        self.timers.cancel_all();
        info!("version checker stopped");
        self.host
    }

    /// Process one event. Returns `false` when the loop should end.
    pub async fn handle(&mut self, event: SkillEvent) -> bool {
        match event {
            SkillEvent::Intent(Intent::CheckVersion) => self.check_version().await,
            SkillEvent::Intent(Intent::CheckPlatformBuild) => self.check_platform_build().await,
            SkillEvent::Timer(tick) => {
                if self.timers.accept(&tick) {
                    match tick.name.as_str() {
                        DAILY_CHECK_TIMER => self.daily_version_check().await,
                        QUEUE_NOTICE_TIMER => self.queue_notice().await,
                        other => warn!(timer = other, "tick for unknown timer"),
                    }
                }
            }
            SkillEvent::OutputFinished => {
                // A pending notice is pushed back by further output too.
                if self.activity_armed || self.is_notice_pending() {
                    self.on_user_activity();
                }
            }
            SkillEvent::Stop => self.stop(),
            SkillEvent::Shutdown => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    /// Fetch the latest release. Failures keep the previous value.
    pub async fn refresh_latest_version(&mut self) {
        match self.feed.latest_version().await {
            Ok(version) => {
                if self.latest != Some(version) {
                    info!(latest = %version, "latest release updated");
                }
                self.latest = Some(version);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    previous = ?self.latest.map(|v| v.to_string()),
                    "release check failed, keeping previous latest version"
                );
            }
        }
    }

    /// Consent ceiling; defaults to the running `major.minor` when unset.
    pub fn allowed_version(&self) -> Version {
        let stored = match self.settings.max_allowed_core_version() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "cannot read version ceiling, using running version");
                None
            }
        };

        match stored.map(decode_allowed) {
            None => self.current.as_ceiling(),
            Some(Ok(ceiling)) => ceiling,
            Some(Err(e)) => {
                warn!(error = %e, "ignoring stored version ceiling");
                self.current.as_ceiling()
            }
        }
    }

    fn platform(&self) -> Platform {
        Platform::from_setting(self.settings.platform().as_deref())
    }

    /// Report the running version and offer whatever upgrade applies.
    pub async fn check_version(&mut self) {
        self.refresh_latest_version().await;
        let current = self.current;
        let allowed = self.allowed_version();
        let platform = self.platform();

        self.host.display_text(&current.to_string()).await;
        self.host
            .speak(Dialog::Version {
                version: current.to_string(),
            })
            .await;

        let latest = self.latest;
        match latest {
            None => self.host.speak(Dialog::CheckFailed).await,
            Some(latest) if latest == current => self.host.speak(Dialog::LatestVersion).await,
            Some(latest) if latest > allowed => self.major_upgrade_consent(latest).await,
            Some(latest) if latest > current && platform.supports_auto_upgrade() => {
                let answer = self
                    .host
                    .ask_yes_no(Dialog::UpgradeAsk {
                        version: latest.to_string(),
                    })
                    .await;
                if answer.is_yes() {
                    self.start_upgrade(latest, &platform).await;
                } else {
                    self.host.speak(Dialog::UpgradeCancelled).await;
                }
            }
            Some(latest) if latest < current => {
                self.host
                    .speak(Dialog::AheadOfRelease {
                        latest: latest.to_string(),
                    })
                    .await;
            }
            Some(latest) => {
                self.host
                    .speak(Dialog::ManualUpdate {
                        version: latest.to_string(),
                        guidance: platform.manual_guidance(),
                    })
                    .await;
            }
        }

        // An explicit check closes the current notice cycle.
        self.activity_armed = false;
        self.timers.cancel(QUEUE_NOTICE_TIMER);
        self.reschedule_daily_check();
    }

    /// Ask before raising the consent ceiling to `latest`.
    pub async fn major_upgrade_consent(&mut self, latest: Version) {
        let answer = self
            .host
            .ask_yes_no(Dialog::MajorUpgradeAsk {
                version: latest.major_minor(),
            })
            .await;

        if answer.is_yes() {
            let platform = self.platform();
            self.start_upgrade(latest, &platform).await;
        } else {
            info!(latest = %latest, "major upgrade declined");
            self.host
                .speak(Dialog::UpgradeDeclined {
                    version: latest.major_minor(),
                })
                .await;
        }
    }

    async fn start_upgrade(&mut self, latest: Version, platform: &Platform) {
        if let Err(e) = self.save_upgrade_permission(latest).await {
            warn!(error = %e, latest = %latest, "could not store upgrade consent");
        }
        self.host.speak(Dialog::UpgradeStarted).await;
        let paired = self.settings.is_paired();
        info!(latest = %latest, platform = platform.id(), paired, "triggering system update");
        self.host
            .emit(BusMessage::system_update(paired, platform.id()))
            .await;
    }

    /// Daily timer callback: wait for the user if an unapproved release exists.
    pub async fn daily_version_check(&mut self) {
        self.refresh_latest_version().await;
        let allowed = self.allowed_version();

        match self.latest {
            Some(latest) if latest > allowed => {
                info!(latest = %latest, allowed = %allowed, "update needs consent, waiting for user activity");
                self.activity_armed = true;
            }
            _ => debug!("no update needing consent"),
        }
    }

    /// Host output finished: (re)arm the notice and restart the daily cadence.
    pub fn on_user_activity(&mut self) {
        self.timers
            .schedule_once(QUEUE_NOTICE_TIMER, self.schedule.notice_delay());
        self.activity_armed = false;
        self.reschedule_daily_check();
    }

    /// Notice timer callback.
    pub async fn queue_notice(&mut self) {
        if self.host.is_speaking() {
            debug!("host still speaking, postponing update notice");
            self.on_user_activity();
            return;
        }

        let Some(latest) = self.latest else {
            return;
        };
        let allowed = self.allowed_version();
        if latest <= allowed {
            debug!(latest = %latest, "update already approved, dropping notice");
            return;
        }

        let platform = self.platform();
        if platform.supports_auto_upgrade() {
            self.major_upgrade_consent(latest).await;
        } else {
            self.host
                .speak(Dialog::ManualUpdate {
                    version: latest.to_string(),
                    guidance: platform.manual_guidance(),
                })
                .await;
        }
    }

    /// Report the platform build and, on generic hosts, the OS.
    pub async fn check_platform_build(&mut self) {
        match self.settings.platform_build() {
            Some(build) => {
                self.host.display_text(&build).await;
                self.host.speak(Dialog::PlatformBuild { build }).await;
            }
            None => self.host.speak(Dialog::PlatformBuildNone).await,
        }

        if self.platform().is_appliance() {
            return;
        }
        match read_os_identity(&self.host_files.issue_path, &self.host_files.os_release_path) {
            Ok(identity) => self.host.speak(Dialog::Os(identity)).await,
            Err(e) => debug!(error = %e, "no OS identification available"),
        }
    }

    /// Store consent for `version` and tell other processes to reload settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be encoded or the settings
    /// file cannot be written.
    pub async fn save_upgrade_permission(&mut self, version: Version) -> Result<()> {
        let value = encode_allowed(&version)?;
        self.settings.set_max_allowed_core_version(value)?;
        info!(ceiling = value, "stored upgrade consent");
        self.host.emit(BusMessage::configuration_updated()).await;
        Ok(())
    }

    /// Drop a pending notice and stop listening for activity.
    pub fn stop(&mut self) {
        if self.timers.cancel(QUEUE_NOTICE_TIMER) {
            debug!("pending update notice cancelled by stop");
        }
        self.activity_armed = false;
    }

    async fn shutdown(&mut self) {
        self.timers.cancel_all();
        for message in intents::detach_messages() {
            self.host.emit(message).await;
        }
    }

    fn reschedule_daily_check(&mut self) {
        let interval = self.schedule.check_interval();
        self.timers
            .schedule_repeating(DAILY_CHECK_TIMER, interval, interval);
    }
}
