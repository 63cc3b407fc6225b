//! Configuration loading and validation for the orchestration side.
//!
//! All values are read from `X4_*` environment variables. Every field has a
//! documented default, so an empty environment yields a working setup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Smallest frame size accepted; every request and response the facade
/// lets through must fit in one frame.
pub use common::limits::MIN_FRAME_BYTES;

/// Where the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// Dedicated thread in this process.
    #[default]
    Thread,
    /// Separate `enclave` process over stdio.
    Process,
}

/// Validated orchestration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Worker host: `thread` or `process`.
    #[serde(default)]
    pub worker_mode: WorkerMode,

    /// Path of the `enclave` binary, used in `process` mode.
    #[serde(default = "default_enclave_path")]
    pub enclave_path: PathBuf,

    /// Seconds to wait for any single worker response.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Calibration latency target in milliseconds.
    #[serde(default = "default_calibration_target")]
    pub calibration_target_ms: u64,

    /// Longest accepted protocol line in `process` mode, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_enclave_path() -> PathBuf {
    PathBuf::from("enclave")
}
fn default_request_timeout() -> u64 {
    120
}
fn default_calibration_target() -> u64 {
    300
}
fn default_max_frame_bytes() -> usize {
    4 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_mode: WorkerMode::default(),
            enclave_path: default_enclave_path(),
            request_timeout_secs: default_request_timeout(),
            calibration_target_ms: default_calibration_target(),
            max_frame_bytes: default_max_frame_bytes(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from `X4_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("X4"))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Per-request worker timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("X4_REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.calibration_target_ms == 0 {
            anyhow::bail!("X4_CALIBRATION_TARGET_MS must be > 0");
        }
        if self.max_frame_bytes < MIN_FRAME_BYTES {
            anyhow::bail!("X4_MAX_FRAME_BYTES must be at least {MIN_FRAME_BYTES}");
        }
        if self.worker_mode == WorkerMode::Process && self.enclave_path.as_os_str().is_empty() {
            anyhow::bail!("X4_ENCLAVE_PATH is required in process mode");
        }
        Ok(())
    }
}
