//! Key-derivation parameters shared by all four layers of one envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest PBKDF2 iteration count ever used or embedded in a header.
pub const MIN_ITERATIONS: u32 = 120_000;

/// Highest PBKDF2 iteration count ever used or embedded in a header.
pub const MAX_ITERATIONS: u32 = 1_200_000;

/// Iteration count assumed when none is given (and for legacy ciphertext).
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Hash function driving the PBKDF2 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlg {
    /// HMAC-SHA-256. Used for anything unrecognised.
    #[default]
    Sha256,
    /// HMAC-SHA-512.
    Sha512,
}

impl HashAlg {
    /// Canonical header spelling (`SHA-256` / `SHA-512`).
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlg::Sha256 => "SHA-256",
            HashAlg::Sha512 => "SHA-512",
        }
    }

    /// Lenient mapping used by the header codec: only the exact string
    /// `SHA-512` selects SHA-512, everything else falls back to SHA-256.
    pub fn normalize(value: &str) -> Self {
        if value == "SHA-512" {
            HashAlg::Sha512
        } else {
            HashAlg::Sha256
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse for user-facing input (CLI flags); rejects unknown names.
impl FromStr for HashAlg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "SHA-256" | "SHA256" => Ok(HashAlg::Sha256),
            "SHA-512" | "SHA512" => Ok(HashAlg::Sha512),
            other => Err(format!("unsupported hash `{other}` (expected SHA-256 or SHA-512)")),
        }
    }
}

impl Serialize for HashAlg {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HashAlg {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(HashAlg::normalize(&raw))
    }
}

/// Clamp any requested iteration count into `[MIN_ITERATIONS, MAX_ITERATIONS]`.
pub fn clamp_iterations(requested: u64) -> u32 {
    // The upper bound fits in u32, so the narrowing cast is lossless.
    requested.clamp(u64::from(MIN_ITERATIONS), u64::from(MAX_ITERATIONS)) as u32
}

/// PBKDF2 cost parameters.
///
/// Fields are private so that every instance, including ones deserialised
/// from an untrusted header or channel message, has already been clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireParams", into = "WireParams")]
pub struct DerivationParams {
    iterations: u32,
    hash: HashAlg,
}

impl DerivationParams {
    /// Build params, clamping `iterations` into range.
    pub fn new(iterations: u64, hash: HashAlg) -> Self {
        Self {
            iterations: clamp_iterations(iterations),
            hash,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self) -> HashAlg {
        self.hash
    }
}

impl Default for DerivationParams {
    /// `{ iterations: 600000, hash: SHA-256 }`, also the legacy-format params.
    fn default() -> Self {
        Self::new(u64::from(DEFAULT_ITERATIONS), HashAlg::Sha256)
    }
}

#[derive(Serialize, Deserialize)]
struct WireParams {
    iterations: u64,
    hash: HashAlg,
}

impl From<WireParams> for DerivationParams {
    fn from(w: WireParams) -> Self {
        DerivationParams::new(w.iterations, w.hash)
    }
}

impl From<DerivationParams> for WireParams {
    fn from(p: DerivationParams) -> Self {
        WireParams {
            iterations: u64::from(p.iterations),
            hash: p.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_both_ends() {
        assert_eq!(clamp_iterations(0), MIN_ITERATIONS);
        assert_eq!(clamp_iterations(u64::MAX), MAX_ITERATIONS);
        assert_eq!(clamp_iterations(150_000), 150_000);
    }

    #[test]
    fn unknown_hash_normalizes_to_sha256() {
        assert_eq!(HashAlg::normalize("SHA-512"), HashAlg::Sha512);
        assert_eq!(HashAlg::normalize("sha-512"), HashAlg::Sha256);
        assert_eq!(HashAlg::normalize("MD5"), HashAlg::Sha256);
    }

    #[test]
    fn from_str_is_strict() {
        assert_eq!("sha512".parse::<HashAlg>().unwrap(), HashAlg::Sha512);
        assert_eq!("SHA-256".parse::<HashAlg>().unwrap(), HashAlg::Sha256);
        assert!("md5".parse::<HashAlg>().is_err());
    }

    #[test]
    fn deserialising_clamps_untrusted_params() {
        let p: DerivationParams =
            serde_json::from_str(r#"{"iterations":99999999,"hash":"whirlpool"}"#).unwrap();
        assert_eq!(p.iterations(), MAX_ITERATIONS);
        assert_eq!(p.hash(), HashAlg::Sha256);
    }

    #[test]
    fn serialises_with_header_spelling() {
        let p = DerivationParams::new(150_000, HashAlg::Sha512);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"iterations":150000,"hash":"SHA-512"}"#);
    }
}
