//! `enclave`: standalone worker process entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging on stderr.
//! 3. Serve newline-delimited JSON requests from stdin, answering on stdout,
//!    until stdin closes.

use anyhow::Result;
use tracing::info;

use enclave::config::Config;
use enclave::{serve, telemetry, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: worker configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "x4 worker starting");

    // -----------------------------------------------------------------------
    // 3. Request loop
    // -----------------------------------------------------------------------
    serve::run(
        tokio::io::stdin(),
        tokio::io::stdout(),
        Worker::new(),
        cfg.max_frame_bytes,
    )
    .await?;

    info!("x4 worker exiting");
    Ok(())
}
