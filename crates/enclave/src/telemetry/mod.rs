//! Structured logging for the worker.
//!
//! # Telemetry invariants
//!
//! - **No secrets, plaintext, payloads or AAD** in any log field. Log ids,
//!   command names, params, durations and error codes only.
//! - Output goes to stderr: stdout of the worker process is the response
//!   stream.
//! - Log level is configurable via `ENCLAVE_LOG_LEVEL` (default: `info`);
//!   `RUST_LOG` takes precedence when set.

pub mod init;

pub use init::init_telemetry;
