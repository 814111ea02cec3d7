//! Version reports, consent and the debounced daily notice, on a paused clock.

use crate::helpers::{Harness, MemorySettings, Output, ScriptedFeed};
use std::time::Duration;
use tokio::time::Instant;
use version_checker::config::{HostFilesConfig, MIN_CHECK_INTERVAL, ScheduleConfig};
use version_checker::dialog::{Answer, Dialog};
use version_checker::intents::Intent;
use version_checker::platform::{ManualGuidance, OsIdentity};
use version_checker::{SkillEvent, Version};

const CURRENT: Version = Version::new(18, 7, 3);
const NEXT_MINOR: Version = Version::new(18, 8, 0);
const NOTICE_DELAY: Duration = Duration::from_secs(30);
const DAY: Duration = Duration::from_secs(86_400);

fn mark_one_with_update() -> Harness {
    Harness::new(
        CURRENT,
        ScriptedFeed::serving(NEXT_MINOR),
        MemorySettings::on_platform("mycroft_mark_1").paired(),
    )
}

/// Initialize and handle the immediate first daily check.
async fn after_first_daily_check(h: &mut Harness) {
    h.skill.initialize();
    let event = h.step().await;
    assert!(matches!(event, SkillEvent::Timer(ref t) if t.name == "version_checker.daily_check"));
}

// ---------------------------------------------------------------------------
// check_version
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn up_to_date_reports_latest() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(CURRENT),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    h.skill.handle(SkillEvent::Intent(Intent::CheckVersion)).await;

    assert_eq!(
        h.host.outputs(),
        vec![
            Output::Displayed("18.7.3".to_owned()),
            Output::Spoke(Dialog::Version {
                version: "18.7.3".to_owned()
            }),
            Output::Spoke(Dialog::LatestVersion),
        ]
    );
    assert!(h.host.asked().is_empty());
    assert!(h.skill.is_daily_check_scheduled());
}

#[tokio::test(start_paused = true)]
async fn major_upgrade_accepted_stores_ceiling_and_triggers_update() {
    let mut h = mark_one_with_update();
    h.host.answer(Answer::Yes);
    h.skill.check_version().await;

    assert_eq!(
        h.host.asked(),
        vec![Dialog::MajorUpgradeAsk {
            version: "18.8".to_owned()
        }]
    );
    assert_eq!(h.settings.ceiling(), Some(Version::ceiling(18, 8)));
    assert_eq!(
        h.host.emitted_types(),
        vec!["configuration.updated", "system.update"]
    );
    assert!(h.host.spoken().contains(&Dialog::UpgradeStarted));

    let update = h.host.emitted("system.update").unwrap();
    assert_eq!(update.data["paired"], true);
    assert_eq!(update.data["platform"], "mycroft_mark_1");
}

#[tokio::test(start_paused = true)]
async fn major_upgrade_declined_leaves_ceiling() {
    let mut h = mark_one_with_update();
    h.host.answer(Answer::No);
    h.skill.check_version().await;

    assert_eq!(h.settings.ceiling(), None);
    assert!(h.host.emitted_types().is_empty());
    assert_eq!(
        h.host.spoken().last(),
        Some(&Dialog::UpgradeDeclined {
            version: "18.8".to_owned()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn silence_counts_as_declined() {
    let mut h = mark_one_with_update();
    h.skill.check_version().await;

    assert_eq!(h.settings.ceiling(), None);
    assert!(h.host.emitted("system.update").is_none());
}

#[tokio::test(start_paused = true)]
async fn build_update_within_ceiling_asks_on_auto_upgrade_platform() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(Version::new(18, 7, 5)),
        MemorySettings::on_platform("picroft"),
    );
    h.host.answer(Answer::Yes);
    h.skill.check_version().await;

    assert_eq!(
        h.host.asked(),
        vec![Dialog::UpgradeAsk {
            version: "18.7.5".to_owned()
        }]
    );
    assert_eq!(h.settings.ceiling(), Some(Version::ceiling(18, 7)));
    let update = h.host.emitted("system.update").unwrap();
    assert_eq!(update.data["platform"], "picroft");
    assert_eq!(update.data["paired"], false);
}

#[tokio::test(start_paused = true)]
async fn build_update_refused_is_cancelled() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(Version::new(18, 7, 5)),
        MemorySettings::on_platform("picroft"),
    );
    h.host.answer(Answer::No);
    h.skill.check_version().await;

    assert_eq!(h.host.spoken().last(), Some(&Dialog::UpgradeCancelled));
    assert!(h.host.emitted_types().is_empty());
}

#[tokio::test(start_paused = true)]
async fn build_update_on_desktop_gives_manual_instructions() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(Version::new(18, 7, 5)),
        MemorySettings::on_platform("desktop"),
    );
    h.skill.check_version().await;

    assert!(h.host.asked().is_empty());
    assert_eq!(
        h.host.spoken().last(),
        Some(&Dialog::ManualUpdate {
            version: "18.7.5".to_owned(),
            guidance: ManualGuidance::SourceCheckout,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn consented_ceiling_skips_major_question() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(NEXT_MINOR),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    h.settings.set_ceiling(18.8);
    h.host.answer(Answer::Yes);
    h.skill.check_version().await;

    assert_eq!(
        h.host.asked(),
        vec![Dialog::UpgradeAsk {
            version: "18.8.0".to_owned()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn newer_than_release_is_reported() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(Version::new(18, 7, 1)),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    h.skill.check_version().await;

    assert_eq!(
        h.host.spoken().last(),
        Some(&Dialog::AheadOfRelease {
            latest: "18.7.1".to_owned()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn unreachable_feed_reports_failure() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::unreachable(),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    h.skill.check_version().await;

    assert_eq!(h.host.spoken().last(), Some(&Dialog::CheckFailed));
    assert_eq!(h.skill.latest_version(), None);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_keeps_previous_latest() {
    let mut h = mark_one_with_update();
    h.skill.refresh_latest_version().await;
    h.feed.set(None);

    h.host.answer(Answer::No);
    h.skill.check_version().await;

    assert_eq!(h.feed.calls(), 2);
    assert_eq!(h.skill.latest_version(), Some(NEXT_MINOR));
    assert_eq!(
        h.host.asked(),
        vec![Dialog::MajorUpgradeAsk {
            version: "18.8".to_owned()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn check_version_restarts_daily_cadence() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(CURRENT),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    let start = Instant::now();
    after_first_daily_check(&mut h).await;

    tokio::time::sleep(Duration::from_secs(10 * 3600)).await;
    h.skill.check_version().await;

    let event = h.step().await;
    assert!(matches!(event, SkillEvent::Timer(_)));
    assert_eq!(start.elapsed(), Duration::from_secs(10 * 3600) + DAY);
}

// ---------------------------------------------------------------------------
// daily check and notice debounce
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn daily_check_without_gap_stays_quiet() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(CURRENT),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    after_first_daily_check(&mut h).await;
    assert!(!h.skill.is_activity_listener_armed());

    h.skill.handle(SkillEvent::OutputFinished).await;
    h.run_for(Duration::from_secs(120)).await;

    assert!(h.host.outputs().is_empty());
    assert!(!h.skill.is_notice_pending());
}

#[tokio::test(start_paused = true)]
async fn daily_check_with_gap_waits_for_activity_then_quiet() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;
    assert!(h.skill.is_activity_listener_armed());
    assert!(h.host.outputs().is_empty(), "must not interrupt before activity");

    tokio::time::sleep(Duration::from_secs(600)).await;
    let activity = Instant::now();
    h.skill.handle(SkillEvent::OutputFinished).await;
    assert!(!h.skill.is_activity_listener_armed());
    assert!(h.skill.is_notice_pending());

    h.host.answer(Answer::Yes);
    h.step().await;

    assert_eq!(activity.elapsed(), NOTICE_DELAY);
    assert_eq!(
        h.host.asked(),
        vec![Dialog::MajorUpgradeAsk {
            version: "18.8".to_owned()
        }]
    );
    assert!(h.host.emitted("system.update").is_some());
}

#[tokio::test(start_paused = true)]
async fn repeated_activity_delivers_one_notice() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;

    h.skill.handle(SkillEvent::OutputFinished).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    let last_activity = Instant::now();
    h.skill.handle(SkillEvent::OutputFinished).await;

    h.step().await;
    assert_eq!(last_activity.elapsed(), NOTICE_DELAY);
    assert_eq!(h.host.asked().len(), 1);

    h.skill.handle(SkillEvent::OutputFinished).await;
    h.run_for(Duration::from_secs(300)).await;
    assert_eq!(h.host.asked().len(), 1, "notice delivered twice");
}

#[tokio::test(start_paused = true)]
async fn declined_check_version_ends_notice_cycle() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;
    assert!(h.skill.is_activity_listener_armed());

    h.host.answer(Answer::No);
    h.skill.handle(SkillEvent::Intent(Intent::CheckVersion)).await;
    assert_eq!(h.host.asked().len(), 1);
    assert!(!h.skill.is_activity_listener_armed());

    h.skill.handle(SkillEvent::OutputFinished).await;
    h.run_for(Duration::from_secs(60)).await;

    assert_eq!(h.host.asked().len(), 1, "question repeated after a no");
    assert!(!h.skill.is_notice_pending());
}

#[tokio::test(start_paused = true)]
async fn check_version_cancels_pending_notice() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;
    h.skill.handle(SkillEvent::OutputFinished).await;
    assert!(h.skill.is_notice_pending());

    h.host.answer(Answer::No);
    h.skill.handle(SkillEvent::Intent(Intent::CheckVersion)).await;
    assert!(!h.skill.is_notice_pending());

    h.run_for(NOTICE_DELAY * 2).await;
    assert_eq!(h.host.asked().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_check_interval_falls_back_to_minimum() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(CURRENT),
        MemorySettings::on_platform("mycroft_mark_1"),
    )
    .with_schedule(ScheduleConfig {
        check_interval_secs: 0,
        notice_delay_secs: 0,
    });
    let start = Instant::now();
    after_first_daily_check(&mut h).await;

    let event = h.step().await;
    assert!(matches!(event, SkillEvent::Timer(_)));
    assert_eq!(start.elapsed(), MIN_CHECK_INTERVAL);
    assert_eq!(h.feed.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn notice_while_speaking_is_postponed() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;

    let activity = Instant::now();
    h.skill.handle(SkillEvent::OutputFinished).await;
    h.host.set_speaking(true);

    h.step().await;
    assert_eq!(activity.elapsed(), NOTICE_DELAY);
    assert!(h.host.asked().is_empty());
    assert!(h.skill.is_notice_pending());

    h.host.set_speaking(false);
    h.step().await;
    assert_eq!(activity.elapsed(), NOTICE_DELAY * 2);
    assert_eq!(h.host.asked().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn activity_restarts_daily_cadence() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(NEXT_MINOR),
        MemorySettings::on_platform("mycroft_mark_1"),
    );
    let start = Instant::now();
    after_first_daily_check(&mut h).await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    h.skill.handle(SkillEvent::OutputFinished).await;
    h.step().await; // notice
    h.host.clear();

    let event = h.step().await;
    assert!(matches!(event, SkillEvent::Timer(ref t) if t.name == "version_checker.daily_check"));
    assert_eq!(start.elapsed(), Duration::from_secs(3600) + DAY);
}

#[tokio::test(start_paused = true)]
async fn manual_platform_notice_gives_instructions() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::serving(NEXT_MINOR),
        MemorySettings::on_platform("mycroft_mark_2"),
    );
    after_first_daily_check(&mut h).await;
    h.skill.handle(SkillEvent::OutputFinished).await;
    h.step().await;

    assert!(h.host.asked().is_empty());
    assert_eq!(
        h.host.spoken(),
        vec![Dialog::ManualUpdate {
            version: "18.8.0".to_owned(),
            guidance: ManualGuidance::DeviceSettings,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn consent_given_meanwhile_drops_notice() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;
    h.skill.handle(SkillEvent::OutputFinished).await;
    h.settings.set_ceiling(18.8);

    h.step().await;
    assert!(h.host.outputs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_notice() {
    let mut h = mark_one_with_update();
    after_first_daily_check(&mut h).await;
    h.skill.handle(SkillEvent::OutputFinished).await;
    assert!(h.skill.is_notice_pending());

    h.skill.handle(SkillEvent::Stop).await;
    assert!(!h.skill.is_notice_pending());

    h.run_for(Duration::from_secs(300)).await;
    assert!(h.host.outputs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_detaches_intents() {
    let mut h = mark_one_with_update();
    h.skill.initialize();

    let keep_running = h.skill.handle(SkillEvent::Shutdown).await;
    assert!(!keep_running);
    assert!(!h.skill.is_daily_check_scheduled());
    assert_eq!(h.host.emitted_types(), vec!["detach_intent", "detach_intent"]);
}

// ---------------------------------------------------------------------------
// check_platform_build
// ---------------------------------------------------------------------------

#[tokio::test]
async fn platform_build_on_appliance() {
    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::unreachable(),
        MemorySettings::on_platform("mycroft_mark_1").with_build("11"),
    );
    h.skill
        .handle(SkillEvent::Intent(Intent::CheckPlatformBuild))
        .await;

    assert_eq!(
        h.host.outputs(),
        vec![
            Output::Displayed("11".to_owned()),
            Output::Spoke(Dialog::PlatformBuild {
                build: "11".to_owned()
            }),
        ]
    );
}

#[tokio::test]
async fn no_platform_build_on_desktop_adds_os() {
    let dir = tempfile::tempdir().unwrap();
    let os_release = dir.path().join("os-release");
    std::fs::write(&os_release, "NAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\n").unwrap();
    let files = HostFilesConfig {
        issue_path: dir.path().join("missing-issue"),
        os_release_path: os_release,
    };

    let mut h = Harness::new(
        CURRENT,
        ScriptedFeed::unreachable(),
        MemorySettings::on_platform("desktop"),
    )
    .with_host_files(files);
    h.skill.check_platform_build().await;

    assert_eq!(
        h.host.spoken(),
        vec![
            Dialog::PlatformBuildNone,
            Dialog::Os(OsIdentity::VersionId("12".to_owned())),
        ]
    );
}
