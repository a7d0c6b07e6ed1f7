//! Tracing subscriber setup.
//!
//! - Console output (development)
//! - JSON structured logging (production)

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::LoggingConfig;
use crate::error::{JobsError, JobsResult};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output (for development).
    Console,
    /// JSON structured logging (for production).
    Json,
}

impl TracingFormat {
    /// Parse `"console"` or `"json"`; anything else is console.
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => TracingFormat::Json,
            _ => TracingFormat::Console,
        }
    }
}

/// Build the level filter: `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> JobsResult<()> {
    let fmt_layer = match TracingFormat::parse(&config.format) {
        TracingFormat::Console => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| JobsError::Config(format!("cannot install tracing subscriber: {e}")))?;

    tracing::debug!(format = %config.format, level = %config.level, "Tracing initialized");
    Ok(())
}
