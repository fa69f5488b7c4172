//! Initialisation du logging
//!
//! `RUST_LOG` prend le pas sur le niveau configuré (`host.logger.min_level`).

use anyhow::{anyhow, Result};
use brspconfig::Config;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Converts a configured level name (`TRACE` .. `ERROR`, case-insensitive)
pub fn string_to_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" => Some(Level::ERROR),
        _ => None,
    }
}

/// Installs the global fmt subscriber
///
/// Fails instead of panicking when a subscriber is already installed (tests,
/// host application).
pub fn init_logging(min_level: &str) -> Result<()> {
    let level = string_to_level(min_level).map(LevelFilter::from_level).unwrap_or_else(|| {
        eprintln!("Unknown log level '{}', using INFO", min_level);
        LevelFilter::INFO
    });

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true),
        )
        .try_init()
        .map_err(|e| anyhow!("Logging already initialised: {}", e))
}

/// [`init_logging`] with the level read from the configuration
pub fn init_logging_from_config(config: &Config) -> Result<()> {
    init_logging(&config.get_log_min_level())
}
