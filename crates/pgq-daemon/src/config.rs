//! Daemon configuration: config file plus environment overrides

use anyhow::{Context, Result};
use pgq_config::AppConfig;
use std::env;

/// Load the config file and apply environment overrides.
///
/// - `DATABASE_URL` replaces `address`
/// - `GATHER_INTERVAL` replaces `interval_secs`
pub fn load() -> Result<AppConfig> {
    let mut config = AppConfig::load().context("Failed to load configuration file")?;
    apply_env(&mut config)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_env(config: &mut AppConfig) -> Result<()> {
    if let Ok(address) = env::var("DATABASE_URL") {
        config.address = address;
    }

    if let Ok(interval) = env::var("GATHER_INTERVAL") {
        config.interval_secs = interval.parse().context("Invalid GATHER_INTERVAL")?;
    }

    Ok(())
}
