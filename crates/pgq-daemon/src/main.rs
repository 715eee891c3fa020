//! pgqd - periodic SQL query collector
//!
//! This binary coordinates:
//! - Running the configured queries against PostgreSQL on an interval
//! - Mapping each result row to a metric
//! - Handing metrics to the configured sinks

mod config;
mod scheduler;

use anyhow::{Context, Result};
use pgq_config::{AppConfig, InfluxSinkConfig, PostgresSinkConfig};
use pgq_core::{Collector, Sink};
use pgq_db::PgClient;
use pgq_sinks::{FsSink, LogSink};
use tracing::{error, info};

use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "--sample-config") {
        print!("{}", pgq_config::SAMPLE_CONFIG);
        return Ok(());
    }

    // Load configuration
    let config = config::load()?;

    // Initialize logging
    pgq_obs::init("pgqd", config.debug);
    info!("Starting pgqd");

    // The connection itself is opened on the first gather
    let client = PgClient::new(&config.address).context("Invalid database address")?;
    info!(
        address = %client.address(),
        queries = config.queries.len(),
        "Loaded configuration"
    );

    let sinks = build_sinks(&config).await?;
    info!("Configured {} sink(s)", sinks.len());

    let collector = Collector::new(client, config.queries.clone());
    let mut scheduler = Scheduler::new(collector, sinks, config.interval())
        .with_gather_timeout(config.gather_timeout());

    // Setup signal handler for graceful shutdown
    let shutdown = setup_shutdown_handler();

    info!("Collector running - press Ctrl+C to stop");

    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                error!("Scheduler error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown => {
            info!("Shutdown signal received");
            scheduler.stop().await;
        }
    }

    info!("pgqd stopped");
    Ok(())
}

async fn build_sinks(config: &AppConfig) -> Result<Vec<Box<dyn Sink>>> {
    let sinks_config = config.sinks();
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if let Some(fs) = sinks_config.fs {
        let sink = FsSink::new(&fs.dir).context("Failed to create fs sink")?;
        sinks.push(Box::new(sink));
    }
    if let Some(influx) = sinks_config.influx {
        sinks.push(influx_sink(influx)?);
    }
    if let Some(postgres) = sinks_config.postgres {
        sinks.push(postgres_sink(postgres).await?);
    }

    if sinks.is_empty() {
        sinks.push(Box::new(LogSink));
    }
    Ok(sinks)
}

#[cfg(feature = "influx")]
fn influx_sink(cfg: InfluxSinkConfig) -> Result<Box<dyn Sink>> {
    let sink = pgq_sinks::influx::InfluxSink::new(cfg.url, cfg.org, cfg.bucket, cfg.token)
        .context("Failed to create influx sink")?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "influx"))]
fn influx_sink(_cfg: InfluxSinkConfig) -> Result<Box<dyn Sink>> {
    anyhow::bail!("[sinks.influx] is configured but pgqd was built without the `influx` feature")
}

#[cfg(feature = "postgres")]
async fn postgres_sink(cfg: PostgresSinkConfig) -> Result<Box<dyn Sink>> {
    let sink = pgq_sinks::postgres::PostgresSink::new(&cfg.url)
        .await
        .context("Failed to create postgres sink")?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_sink(_cfg: PostgresSinkConfig) -> Result<Box<dyn Sink>> {
    anyhow::bail!("[sinks.postgres] is configured but pgqd was built without the `postgres` feature")
}

/// Setup graceful shutdown handler
async fn setup_shutdown_handler() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to setup signal handler");
}
