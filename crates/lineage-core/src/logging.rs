//! Tracing subscriber setup.
//!
//! `RUST_LOG` always wins over the configured level.

use tracing_subscriber::EnvFilter;

use lineage_config::LoggingConfig;

/// Errors from installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// The level directive for a configured level raised by `verbose` steps
/// (`-v` is debug, `-vv` and beyond trace).
pub fn effective_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => match configured {
            "trace" => "trace",
            _ => "debug",
        },
        _ => "trace",
    }
}

/// Install a fmt subscriber at the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    init_with_level(&config.level)
}

/// Install a fmt subscriber filtering at `level` unless `RUST_LOG` is set.
pub fn init_with_level(level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .try_init()
        .map_err(LoggingError::Install)
}
