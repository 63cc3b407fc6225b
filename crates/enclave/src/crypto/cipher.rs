//! Four-layer AES-256-GCM sealing over two secrets.
//!
//! **Salt and IV are fresh per layer per call.** A random 96-bit IV under a
//! key derived from a fresh random salt is never reused; do not make either
//! deterministic.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use common::{header::LAYER_COUNT, DerivationParams};
use thiserror::Error;

use super::kdf::{derive_key, SALT_LEN};
use crate::secret::SecretBytes;

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the AES-GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Shortest block that can hold salt, IV and an empty-message tag.
pub const MIN_BLOCK_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;

/// Base64url for payloads: no padding on output, padding tolerated on input.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced by the cipher layer. These never leave the worker; the
/// worker folds every one of them into a single opaque code.
#[derive(Debug, Error)]
pub enum CipherError {
    /// AES-GCM sealing or opening failed (wrong key, tampered data or AAD).
    #[error("aead operation failed")]
    AeadFailure,

    /// A layer block is too short to contain salt, IV and tag.
    #[error("layer block truncated")]
    Truncated,

    /// The payload is not valid base64url.
    #[error("payload is not valid base64url")]
    InvalidEncoding,

    /// The innermost layer did not decrypt to UTF-8 text.
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy)]
enum SecretSlot {
    A,
    B,
}

/// Layer order for sealing: which secret keys it and its context label.
const LAYERS: [(SecretSlot, &str); LAYER_COUNT] = [
    (SecretSlot::A, "layer1"),
    (SecretSlot::A, "layer2"),
    (SecretSlot::B, "layer3"),
    (SecretSlot::B, "layer4"),
];

fn pick<'a>(slot: SecretSlot, a: &'a SecretBytes, b: &'a SecretBytes) -> &'a [u8] {
    match slot {
        SecretSlot::A => a.as_bytes(),
        SecretSlot::B => b.as_bytes(),
    }
}

/// Seal `plaintext` under layers 1 through 4, strictly in order.
///
/// `aad` is bound into every layer's tag.
pub fn seal_layers(
    plaintext: &[u8],
    secret_a: &SecretBytes,
    secret_b: &SecretBytes,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let (first_slot, first_ctx) = LAYERS[0];
    let mut sealed = seal_layer(plaintext, pick(first_slot, secret_a, secret_b), first_ctx, params, aad)?;
    for &(slot, context) in &LAYERS[1..] {
        sealed = seal_layer(&sealed, pick(slot, secret_a, secret_b), context, params, aad)?;
    }
    Ok(sealed)
}

/// Open layers 4 through 1. The first failure aborts the chain; no partial
/// output is ever returned.
pub fn open_layers(
    sealed: &[u8],
    secret_a: &SecretBytes,
    secret_b: &SecretBytes,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let mut current = sealed.to_vec();
    for &(slot, context) in LAYERS.iter().rev() {
        current = open_layer(&current, pick(slot, secret_a, secret_b), context, params, aad)?;
    }
    Ok(current)
}

/// Seal and encode as base64url (no padding).
pub fn seal_payload(
    plaintext: &[u8],
    secret_a: &SecretBytes,
    secret_b: &SecretBytes,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<String, CipherError> {
    let sealed = seal_layers(plaintext, secret_a, secret_b, params, aad)?;
    Ok(PAYLOAD_ENGINE.encode(sealed))
}

/// Decode a base64url payload, open all layers and return the UTF-8 text.
pub fn open_payload(
    payload: &str,
    secret_a: &SecretBytes,
    secret_b: &SecretBytes,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<String, CipherError> {
    let sealed = PAYLOAD_ENGINE
        .decode(payload.trim())
        .map_err(|_| CipherError::InvalidEncoding)?;
    let plaintext = open_layers(&sealed, secret_a, secret_b, params, aad)?;
    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}

fn seal_layer(
    input: &[u8],
    secret: &[u8],
    context: &str,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(secret, &salt, context, params);
    let ciphertext = key.seal(&iv, input, aad)?;

    let mut block = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    block.extend_from_slice(&salt);
    block.extend_from_slice(&iv);
    block.extend_from_slice(&ciphertext);
    Ok(block)
}

fn open_layer(
    block: &[u8],
    secret: &[u8],
    context: &str,
    params: &DerivationParams,
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    if block.len() < MIN_BLOCK_LEN {
        return Err(CipherError::Truncated);
    }
    let (salt, rest) = block.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);
    let key = derive_key(secret, salt, context, params);
    key.open(iv, ciphertext, aad)
}
