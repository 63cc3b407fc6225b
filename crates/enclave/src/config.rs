//! Configuration loading and validation for the standalone worker process.
//!
//! Values are read from `ENCLAVE_*` environment variables at startup. The
//! process exits with a clear error message if any value is invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Smallest frame size accepted; every request and response the facade
/// lets through must fit in one frame.
pub use common::limits::MIN_FRAME_BYTES;

/// Validated worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Longest accepted request line, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
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
            max_frame_bytes: default_max_frame_bytes(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from `ENCLAVE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENCLAVE"))
            .build()
            .context("failed to build worker configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise worker configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.max_frame_bytes < MIN_FRAME_BYTES {
            anyhow::bail!("ENCLAVE_MAX_FRAME_BYTES must be at least {MIN_FRAME_BYTES}");
        }
        if self.log_level.trim().is_empty() {
            anyhow::bail!("ENCLAVE_LOG_LEVEL must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_max_frame_bytes(), 4 * 1024 * 1024);
        assert_eq!(default_log_level(), "info");
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_tiny_frames() {
        let cfg = Config {
            max_frame_bytes: 4096,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn frame_floor_is_inclusive() {
        let at_floor = Config {
            max_frame_bytes: MIN_FRAME_BYTES,
            ..Config::default()
        };
        assert!(at_floor.validate().is_ok());
        let below = Config {
            max_frame_bytes: MIN_FRAME_BYTES - 1,
            ..Config::default()
        };
        assert!(below.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_log_level() {
        let cfg = Config {
            log_level: " ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
