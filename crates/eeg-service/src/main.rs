//! eeg-va: run the valence/arousal service against the simulated headset

use anyhow::{Context, Result};
use clap::Parser;
use eeg_service::{ServiceConfig, ServiceRuntime};
use eeg_simulation::PacedEegSource;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eeg-va")]
#[command(version)]
#[command(about = "Streaming EEG valence/arousal inference", long_about = None)]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_parser = parse_run_for)]
    run_for: Option<Duration>,

    /// Seed for the simulated source
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

/// Finite, non-negative number of seconds
fn parse_run_for(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("'{}' must be a finite, non-negative number of seconds", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServiceConfig::load_json(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    if cli.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let stream = config.stream_config(cli.seed);
    let mut runtime = ServiceRuntime::build(config).context("Invalid service configuration")?;
    spawn_log_subscribers(&mut runtime);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source = PacedEegSource::new(stream).context("Failed to create simulated source")?;
    let ingest = runtime
        .start_ingest(Box::new(source), shutdown_rx.clone())
        .context("Failed to start ingest")?;

    let service = runtime.service().clone();
    let cycle = tokio::spawn(async move { service.run(shutdown_rx).await });

    match cli.run_for {
        Some(duration) => {
            tracing::info!(seconds = duration.as_secs_f64(), "Running for a fixed duration");
            tokio::time::sleep(duration).await;
        }
        None => {
            tracing::info!("Press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
        }
    }

    tracing::info!("Shutting down");
    shutdown_tx.send_replace(true);

    let stats = cycle.await.context("Cycle task panicked")??;
    let report = tokio::task::spawn_blocking(move || ingest.join())
        .await
        .context("Ingest join task failed")??;

    if let Some(error) = &report.error {
        tracing::error!(%error, "Ingest ended early");
    }
    tracing::info!(
        cycles = stats.cycles_completed,
        failed = stats.cycles_failed,
        skipped = stats.ticks_skipped,
        sink_failures = stats.sink_failures,
        chunks = report.chunks,
        reconnects = report.reconnects,
        "Run summary"
    );

    let latest = runtime.latest().get();
    println!("{}", serde_json::to_string(&latest)?);
    Ok(())
}

/// Log every record seen on the broadcast and the bus
fn spawn_log_subscribers(runtime: &mut ServiceRuntime) {
    let mut records = runtime.broadcast().subscribe();
    tokio::spawn(async move {
        loop {
            match records.recv().await {
                Ok(payload) => tracing::info!(%payload, "Result"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Broadcast subscriber lagged")
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(mut bus) = runtime.take_bus_receiver() {
        tokio::spawn(async move {
            while let Some(message) = bus.recv().await {
                tracing::debug!(topic = %message.topic, payload = %message.payload, "Bus message");
            }
        });
    }
}
