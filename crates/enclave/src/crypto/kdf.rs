//! PBKDF2 key derivation with per-layer domain separation.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use common::{DerivationParams, HashAlg};
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::cipher::{CipherError, IV_LEN};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the per-layer random salt.
pub const SALT_LEN: usize = 16;

/// Separates the random salt from the context label in the effective salt.
const CONTEXT_SEPARATOR: u8 = b'|';

/// A single-use AES-256-GCM key bound to one layer.
///
/// The raw key bytes are never exposed; the only thing a `LayerKey` can do
/// is seal or open with the AEAD it was derived for. The cipher state is
/// zeroized on drop.
pub struct LayerKey {
    cipher: Aes256Gcm,
}

impl LayerKey {
    pub fn seal(&self, iv: &[u8; IV_LEN], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.cipher
            .encrypt(Nonce::from_slice(iv), Payload { msg, aad })
            .map_err(|_| CipherError::AeadFailure)
    }

    pub fn open(&self, iv: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        if iv.len() != IV_LEN {
            return Err(CipherError::Truncated);
        }
        self.cipher
            .decrypt(Nonce::from_slice(iv), Payload { msg, aad })
            .map_err(|_| CipherError::AeadFailure)
    }
}

/// Derive the key for one layer.
///
/// The effective PBKDF2 salt is `salt || '|' || context`, so the same secret
/// and salt yield unrelated keys for different layers.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    context: &str,
    params: &DerivationParams,
) -> LayerKey {
    let mut effective_salt = Vec::with_capacity(salt.len() + 1 + context.len());
    effective_salt.extend_from_slice(salt);
    effective_salt.push(CONTEXT_SEPARATOR);
    effective_salt.extend_from_slice(context.as_bytes());

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    derive_bits(secret, &effective_salt, params, &mut okm[..]);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm[..]));
    LayerKey { cipher }
}

/// Raw PBKDF2 output into `out`, using the hash selected by `params`.
pub fn derive_bits(secret: &[u8], salt: &[u8], params: &DerivationParams, out: &mut [u8]) {
    match params.hash() {
        HashAlg::Sha256 => pbkdf2_hmac::<Sha256>(secret, salt, params.iterations(), out),
        HashAlg::Sha512 => pbkdf2_hmac::<Sha512>(secret, salt, params.iterations(), out),
    }
}
