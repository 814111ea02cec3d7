//! Shared fakes for integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use version_checker::config::{HostFilesConfig, ScheduleConfig};
use version_checker::dialog::{Answer, Dialog};
use version_checker::host::Host;
use version_checker::host::contract::BusMessage;
use version_checker::release::ReleaseFeed;
use version_checker::settings::SettingsStore;
use version_checker::version::decode_allowed;
use version_checker::{Result, SkillError, SkillEvent, Version, VersionCheckerSkill};

/// Something the skill did through the host.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Output {
    Spoke(Dialog),
    Displayed(String),
    Asked(Dialog),
    Emitted(BusMessage),
}

#[derive(Default)]
struct HostState {
    outputs: Vec<Output>,
    answers: VecDeque<Answer>,
    speaking: bool,
}

/// Host that records every call and answers from a script.
#[derive(Clone, Default)]
pub(crate) struct RecordingHost {
    state: Arc<Mutex<HostState>>,
}

impl RecordingHost {
    /// Queue the reply to the next yes/no question.
    pub(crate) fn answer(&self, answer: Answer) {
        self.state.lock().unwrap().answers.push_back(answer);
    }

    pub(crate) fn set_speaking(&self, speaking: bool) {
        self.state.lock().unwrap().speaking = speaking;
    }

    pub(crate) fn outputs(&self) -> Vec<Output> {
        self.state.lock().unwrap().outputs.clone()
    }

    pub(crate) fn clear(&self) {
        self.state.lock().unwrap().outputs.clear();
    }

    pub(crate) fn spoken(&self) -> Vec<Dialog> {
        self.outputs()
            .into_iter()
            .filter_map(|o| match o {
                Output::Spoke(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn asked(&self) -> Vec<Dialog> {
        self.outputs()
            .into_iter()
            .filter_map(|o| match o {
                Output::Asked(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn emitted_types(&self) -> Vec<String> {
        self.outputs()
            .into_iter()
            .filter_map(|o| match o {
                Output::Emitted(m) => Some(m.msg_type),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn emitted(&self, msg_type: &str) -> Option<BusMessage> {
        self.outputs().into_iter().find_map(|o| match o {
            Output::Emitted(m) if m.msg_type == msg_type => Some(m),
            _ => None,
        })
    }

    fn push(&self, output: Output) {
        self.state.lock().unwrap().outputs.push(output);
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn speak(&mut self, dialog: Dialog) {
        self.push(Output::Spoke(dialog));
    }

    async fn display_text(&mut self, text: &str) {
        self.push(Output::Displayed(text.to_owned()));
    }

    async fn ask_yes_no(&mut self, question: Dialog) -> Answer {
        self.push(Output::Asked(question));
        self.state
            .lock()
            .unwrap()
            .answers
            .pop_front()
            .unwrap_or(Answer::Unclear)
    }

    async fn emit(&mut self, message: BusMessage) {
        self.push(Output::Emitted(message));
    }

    fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().speaking
    }
}

#[derive(Default)]
struct SettingsState {
    ceiling: Option<f64>,
    platform: Option<String>,
    build: Option<String>,
    paired: bool,
}

/// In-memory settings store.
#[derive(Clone, Default)]
pub(crate) struct MemorySettings {
    state: Arc<Mutex<SettingsState>>,
}

impl MemorySettings {
    pub(crate) fn on_platform(platform: &str) -> Self {
        let settings = Self::default();
        settings.state.lock().unwrap().platform = Some(platform.to_owned());
        settings
    }

    pub(crate) fn with_build(self, build: &str) -> Self {
        self.state.lock().unwrap().build = Some(build.to_owned());
        self
    }

    pub(crate) fn paired(self) -> Self {
        self.state.lock().unwrap().paired = true;
        self
    }

    pub(crate) fn set_ceiling(&self, value: f64) {
        self.state.lock().unwrap().ceiling = Some(value);
    }

    /// Stored ceiling, decoded.
    pub(crate) fn ceiling(&self) -> Option<Version> {
        self.state
            .lock()
            .unwrap()
            .ceiling
            .map(|v| decode_allowed(v).unwrap())
    }
}

impl SettingsStore for MemorySettings {
    fn max_allowed_core_version(&self) -> Result<Option<f64>> {
        Ok(self.state.lock().unwrap().ceiling)
    }

    fn set_max_allowed_core_version(&mut self, value: f64) -> Result<()> {
        self.state.lock().unwrap().ceiling = Some(value);
        Ok(())
    }

    fn platform(&self) -> Option<String> {
        self.state.lock().unwrap().platform.clone()
    }

    fn platform_build(&self) -> Option<String> {
        self.state.lock().unwrap().build.clone()
    }

    fn is_paired(&self) -> bool {
        self.state.lock().unwrap().paired
    }
}

/// Feed whose answer the test controls; `None` simulates an outage.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFeed {
    latest: Arc<Mutex<Option<Version>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedFeed {
    pub(crate) fn serving(latest: Version) -> Self {
        let feed = Self::default();
        feed.set(Some(latest));
        feed
    }

    pub(crate) fn unreachable() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, latest: Option<Version>) {
        *self.latest.lock().unwrap() = latest;
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ReleaseFeed for ScriptedFeed {
    async fn latest_version(&self) -> Result<Version> {
        *self.calls.lock().unwrap() += 1;
        let latest = *self.latest.lock().unwrap();
        latest.ok_or_else(|| SkillError::Release("feed unreachable".to_owned()))
    }
}

pub(crate) type TestSkill = VersionCheckerSkill<RecordingHost, ScriptedFeed, MemorySettings>;

/// A skill plus the receiving end of its event channel.
pub(crate) struct Harness {
    pub skill: TestSkill,
    pub events: mpsc::UnboundedReceiver<SkillEvent>,
    pub host: RecordingHost,
    pub feed: ScriptedFeed,
    pub settings: MemorySettings,
}

impl Harness {
    pub(crate) fn new(current: Version, feed: ScriptedFeed, settings: MemorySettings) -> Self {
        let host = RecordingHost::default();
        let (tx, events) = mpsc::unbounded_channel();
        let skill = VersionCheckerSkill::new(
            host.clone(),
            feed.clone(),
            settings.clone(),
            current,
            tx,
            CancellationToken::new(),
        )
        .with_schedule(ScheduleConfig::default());
        Self {
            skill,
            events,
            host,
            feed,
            settings,
        }
    }

    pub(crate) fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.skill = self.skill.with_schedule(schedule);
        self
    }

    pub(crate) fn with_host_files(mut self, files: HostFilesConfig) -> Self {
        self.skill = self.skill.with_host_files(files);
        self
    }

    /// Wait for the next event (auto-advancing a paused clock) and handle it.
    pub(crate) async fn step(&mut self) -> SkillEvent {
        let event = self.events.recv().await.expect("event channel open");
        self.skill.handle(event.clone()).await;
        event
    }

    /// Handle every event that arrives within `window`.
    pub(crate) async fn run_for(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            self.skill.handle(event).await;
        }
    }
}
