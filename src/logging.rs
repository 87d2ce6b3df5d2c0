//! Logging and tracing initialization.
//!
//! Structured logging via the `tracing` ecosystem: pretty console output
//! for humans, JSON for machine parsing. The level defaults to INFO (DEBUG
//! with `--verbose`) and can always be overridden through `RUST_LOG`.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber. Call once, early in main().
pub fn init(verbose: bool, json: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jobsd={}",
            default_level.as_str().to_lowercase()
        ))
    });

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
