//! PBKDF2 key derivation and four-layer AES-256-GCM sealing.
//!
//! This module is free of I/O and channel concerns.
//!
//! # Layer block format
//!
//! ```text
//! salt(16) || iv(12) || ciphertext || tag(16)
//! ```
//!
//! Each layer's block is the plaintext of the next layer. Layers 1 and 2 are
//! keyed from secret A, layers 3 and 4 from secret B, each with its own
//! context label, so all four keys differ even when A == B. The effective
//! secret diversity is still two, not four.

pub mod calibrate;
pub mod cipher;
pub mod kdf;

pub use cipher::{open_payload, seal_payload, CipherError};
pub use kdf::{KEY_LEN, SALT_LEN};
