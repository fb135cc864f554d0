//! firmwatch — binary entrypoint.
//! Loads config, wires the monitor, and either runs once or sits on the
//! daily schedule. Ctrl-C stops launching new sources; in-flight source
//! ingestions finish naturally.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use firmwatch::config::{Config, DEFAULT_CONFIG_PATH};
use firmwatch::notify::email::EmailTransport;
use firmwatch::scheduler::Monitor;

#[derive(Parser)]
#[command(name = "firmwatch", about = "Monitor campus events and job postings from quantitative finance firms")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full ingest + notify cycle once and exit.
    RunOnce,
    /// Run daily at the configured schedule_time until interrupted.
    Schedule,
    /// Send a test notification to verify transport configuration.
    TestNotification,
    /// Write an example configuration file and exit.
    InitConfig {
        #[arg(long, default_value = "config/firmwatch.toml.example")]
        output: PathBuf,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("firmwatch=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Flip the cancellation flag on the first Ctrl-C.
fn spawn_ctrl_c_watcher(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing in-flight sources");
            let _ = tx.send(true);
        }
    });
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::InitConfig { output } => {
            Config::write_example(&output)?;
            println!("example configuration written to {}", output.display());
            Ok(())
        }
        Command::RunOnce => {
            let config = Config::load(&cli.config)?;
            let (tx, rx) = watch::channel(false);
            spawn_ctrl_c_watcher(tx);
            let monitor = Monitor::from_config(&config, rx).await?;
            let summary = monitor.run_once().await.context("run failed")?;
            let (ok, partial, failed) = summary.source_counts();
            println!(
                "sources: {ok} ok, {partial} partial, {failed} failed; {} new item(s), {} notification(s) sent",
                summary.items_new, summary.notifications_sent
            );
            Ok(())
        }
        Command::Schedule => {
            let config = Config::load(&cli.config)?;
            let (tx, rx) = watch::channel(false);
            spawn_ctrl_c_watcher(tx);
            let monitor = Monitor::from_config(&config, rx).await?;
            monitor.run_daily(&config.schedule_time).await
        }
        Command::TestNotification => {
            let config = Config::load(&cli.config)?;
            if config.email.enabled {
                let transport = EmailTransport::from_config(&config.email)?;
                transport.send_test_message().await?;
                println!("test email sent to {}", config.email.recipient_email);
            } else {
                println!("email disabled; console transport is always available");
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "fatal");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
