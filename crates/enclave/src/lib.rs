//! The isolated side of the x4 isolation boundary.
//!
//! Everything that touches secret bytes or runs PBKDF2 lives here: key
//! derivation, the four-layer cipher, calibration, and the [`worker::Worker`]
//! that turns channel requests into responses. The worker is hosted either on
//! a dedicated thread ([`host`]) or as a separate process speaking JSON lines
//! ([`serve`], used by the `enclave` binary).

pub mod config;
pub mod crypto;
pub mod host;
pub mod secret;
pub mod serve;
pub mod telemetry;
pub mod worker;

pub use secret::SecretBytes;
pub use worker::Worker;
