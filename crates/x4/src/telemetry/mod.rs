//! Telemetry initialisation for the `x4` front end.
//!
//! Structured JSON logs only, written to stderr so that stdout carries nothing
//! but command output. Secrets and plaintext never reach a log field.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the tracing subscriber at `log_level`.
///
/// `RUST_LOG`, when set, overrides the configured level.
///
/// # Errors
///
/// Returns an error if the subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise x4 tracing subscriber: {e}"))
}
