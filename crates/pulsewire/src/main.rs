//! pulsewire - run heart-rate sessions and push readings to a collection endpoint
//!
//! Subcommands:
//! - `pulsewire run` - Run a session against the simulated sensor
//! - `pulsewire send <reading>` - Deliver one reading and report the outcome
//! - `pulsewire config` - Print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pulseconf::PulseConfig;
use pulsewire::{
    telemetry, ActivityConfig, ConvertedReading, DeliveryClient, SessionCoordinator,
    SimulatedBackend,
};

#[derive(Parser, Debug)]
#[command(name = "pulsewire")]
#[command(about = "Live heart-rate session coordinator")]
#[command(version)]
struct Cli {
    /// Config file to load instead of ./pulsewire.toml
    #[arg(short, long, global = true, env = "PULSEWIRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a monitoring session against the simulated sensor
    Run {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Seconds to wait for pending deliveries before exiting
        #[arg(long, default_value = "2")]
        drain_secs: u64,
    },

    /// Deliver a single reading (events per minute) and wait for the outcome
    Send {
        reading: u64,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Also list the files and environment variables that contributed
        #[arg(long)]
        sources: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = PulseConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::debug!(path = %file.display(), "Loaded config file");
    }

    match cli.command {
        Commands::Run {
            duration,
            drain_secs,
        } => run(&config, duration.map(Duration::from_secs), Duration::from_secs(drain_secs)).await,
        Commands::Send { reading } => send(&config, reading).await,
        Commands::Config { sources: show } => {
            print!("{}", config.to_toml());
            if show {
                println!();
                for file in &sources.files {
                    println!("# file: {}", file.display());
                }
                for var in &sources.env_overrides {
                    println!("# env: {}", var);
                }
            }
            Ok(())
        }
    }
}

async fn run(config: &PulseConfig, duration: Option<Duration>, drain: Duration) -> Result<()> {
    let activity = ActivityConfig::try_from(&config.activity).context("Invalid [activity] config")?;
    let delivery = DeliveryClient::new(&config.endpoint).context("Failed to create delivery client")?;
    let backend = Arc::new(SimulatedBackend::new(config.simulator.clone()));

    tracing::info!(endpoint = %delivery.base_url(), "Delivering readings");

    let coordinator = SessionCoordinator::new(backend.clone(), activity, Arc::new(delivery.clone()));
    coordinator.authorize(backend.as_ref()).await;
    coordinator.start().await.context("Failed to start session")?;

    match duration {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted");
        }
    }

    let summary = match coordinator.stop().await {
        Ok(summary) => Some(summary),
        Err(e) if e.is_benign() => {
            tracing::info!(error = %e, "Session already stopped");
            None
        }
        Err(e) => return Err(e).context("Failed to stop session"),
    };

    if !delivery.drain(drain).await {
        tracing::warn!(
            in_flight = delivery.stats().in_flight,
            "Exiting with deliveries still in flight"
        );
    }

    let report = serde_json::json!({
        "session": summary,
        "deliveries": delivery.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn send(config: &PulseConfig, reading: u64) -> Result<()> {
    let delivery = DeliveryClient::new(&config.endpoint).context("Failed to create delivery client")?;
    let url = delivery.build_url(reading)?;

    let status = delivery
        .send_once(ConvertedReading::new(reading))
        .await
        .with_context(|| format!("POST {} failed", url))?;

    println!("POST {} -> {}", url, status);
    Ok(())
}
