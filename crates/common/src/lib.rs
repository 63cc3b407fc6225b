//! Common types, envelope header codec, channel protocol, and errors shared
//! across `x4` crates.
//!
//! Nothing in this crate touches key material; it is safe to use on the
//! orchestration side of the isolation boundary.

pub mod error;
pub mod header;
pub mod limits;
pub mod params;
pub mod protocol;
pub mod secret;

pub use error::{Operation, ServiceError, ValidationError};
pub use params::{DerivationParams, HashAlg};
pub use protocol::ErrorCode;
pub use secret::Secret;
