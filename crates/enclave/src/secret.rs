//! [`SecretBytes`]: normalised secret material held inside the worker.

use std::fmt;

use common::Secret;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

/// UTF-8 bytes of an NFKC-normalised secret.
///
/// Built exactly once per secret per operation and overwritten with zeroes on
/// drop, which runs on success, error and unwind paths alike.
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Normalise and encode `secret`, consuming it. The source text is
    /// zeroized when it drops at the end of this call.
    pub fn from_secret(secret: Secret) -> Self {
        let normalized: String = secret.expose().nfkc().collect();
        Self(Zeroizing::new(normalized.into_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBytes([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_compatibility_forms() {
        // U+FB01 LATIN SMALL LIGATURE FI and full-width digits.
        let a = SecretBytes::from_secret(Secret::new("\u{FB01}le\u{FF11}"));
        let b = SecretBytes::from_secret(Secret::new("file1"));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn composed_and_decomposed_agree() {
        let composed = SecretBytes::from_secret(Secret::new("caf\u{E9}"));
        let decomposed = SecretBytes::from_secret(Secret::new("cafe\u{301}"));
        assert_eq!(composed.as_bytes(), decomposed.as_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let s = SecretBytes::from_secret(Secret::new("alpha"));
        assert_eq!(format!("{s:?}"), "SecretBytes([REDACTED])");
    }
}
