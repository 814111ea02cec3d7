//! Version checker: a voice assistant skill that reports the running core
//! version and asks before upgrading.
//!
//! # Architecture
//!
//! The skill runs as its own process beside the host and talks to it over
//! the host's WebSocket message bus:
//! - **Release feed**: fetches the latest published release over HTTP
//! - **Settings**: reads platform info and stores the upgrade consent ceiling
//! - **Skill**: answers voice intents and schedules the daily update check
//! - **Notice debounce**: waits for host output to finish, then a quiet
//!   period, before asking about an upgrade
//! - **Host**: speak, display, yes/no questions and raw bus events

pub mod config;
pub mod dialog;
pub mod error;
pub mod host;
pub mod intents;
pub mod platform;
pub mod release;
pub mod runtime;
pub mod settings;
pub mod skill;
pub mod skill_dirs;
pub mod timers;
pub mod version;

pub use config::SkillConfig;
pub use error::{Result, SkillError};
pub use skill::{SkillEvent, VersionCheckerSkill};
pub use version::{Build, Version};
