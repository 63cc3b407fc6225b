//! Orchestration side of x4.
//!
//! [`facade::Facade`] is the entry point: it validates input, handles the
//! envelope header and sends every expensive or secret-bearing step through
//! an [`channel::IsolationChannel`] to a worker hosted on its own thread or in
//! a separate `enclave` process.

pub mod channel;
pub mod config;
pub mod facade;
pub mod telemetry;
pub mod transport;

pub use facade::Facade;
