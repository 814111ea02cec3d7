//! Version checker skill process.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use version_checker::SkillConfig;
use version_checker::dialog::Dialog;
use version_checker::{runtime, skill_dirs};

/// Reports the running core version and asks before system upgrades.
#[derive(Parser)]
#[command(name = "version-checker", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to a daily file (under `log_dir`, or the data directory).
    #[arg(long)]
    log_file: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Connect to the host bus and run the skill (default).
    Run,

    /// Fetch the latest release once and print the version comparison.
    Check,

    /// Print platform, platform build and host OS.
    Platform,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => SkillConfig::from_file(path)?,
        None => SkillConfig::load_or_default(&SkillConfig::default_config_path())?,
    };
    let log_dir = match config.log_dir {
        Some(ref dir) => Some(dir.clone()),
        None if cli.log_file => Some(skill_dirs::logs_dir()),
        None => None,
    };
    let _log_guard = init_tracing(log_dir);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_skill(config).await,
        Command::Check => check(config).await,
        Command::Platform => {
            platform(&config);
            Ok(())
        }
    }
}

/// Logs go to stderr; a daily-rolling file is added when `log_dir` is given.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("version_checker=info,reqwest=warn,tungstenite=warn"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "version-checker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

async fn run_skill(config: SkillConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            on_signal.cancel();
        }
    });

    runtime::run(&config, shutdown).await?;
    Ok(())
}

async fn check(config: SkillConfig) -> anyhow::Result<()> {
    let report = runtime::version_report(&config).await?;

    println!("running:  {}", report.current);
    match report.latest {
        Some(latest) => println!("latest:   {latest}"),
        None => println!("latest:   unavailable"),
    }
    println!("allowed:  {}", report.allowed);

    let verdict = match report.latest {
        None => "could not reach the release feed",
        Some(latest) if latest == report.current => "up to date",
        Some(latest) if latest > report.allowed => "newer release needs consent",
        Some(latest) if latest > report.current => "update available",
        Some(_) => "running ahead of the latest release",
    };
    println!("status:   {verdict}");
    Ok(())
}

fn platform(config: &SkillConfig) {
    let report = runtime::platform_report(config);

    println!("platform: {}", report.platform.id());
    println!("build:    {}", report.build.as_deref().unwrap_or("none"));
    if let Some(os) = report.os {
        println!("os:       {}", Dialog::Os(os).render());
    }
}
