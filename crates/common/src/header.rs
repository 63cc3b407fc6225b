//! Envelope header codec.
//!
//! # Envelope format
//!
//! ```text
//! x4v<version>|k=pbkdf2;i=<iterations>;h=<SHA-256|SHA-512>;alg=AES-GCM;layers=4||<base64url-payload>
//! ```
//!
//! The header, including its trailing `||`, is the AAD bound into every
//! layer's authentication tag. Decryption reuses the header text exactly as
//! received so that any edit to it breaks authentication.

use std::fmt;

use crate::params::{DerivationParams, HashAlg, DEFAULT_ITERATIONS, MAX_ITERATIONS, MIN_ITERATIONS};

/// Prefix every recognisable header starts with.
pub const VERSION_TAG: &str = "x4v";

/// Current format version.
pub const FORMAT_VERSION: u32 = 2;

/// Only supported KDF identifier.
pub const KDF_ID: &str = "pbkdf2";

/// Only supported AEAD identifier.
pub const CIPHER_ALG: &str = "AES-GCM";

/// Number of encryption layers in every envelope.
pub const LAYER_COUNT: usize = 4;

/// Separates the header from the payload; part of the AAD.
pub const HEADER_DELIMITER: &str = "||";

/// Format the canonical header (with trailing delimiter) for `params`.
///
/// `params` are already clamped and normalised by construction.
pub fn build(params: &DerivationParams) -> String {
    format!(
        "{VERSION_TAG}{FORMAT_VERSION}|k={KDF_ID};i={};h={};alg={CIPHER_ALG};layers={LAYER_COUNT}{HEADER_DELIMITER}",
        params.iterations(),
        params.hash(),
    )
}

/// A header recognised at the start of an envelope text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader<'a> {
    /// Version number following the tag.
    pub version: u32,
    /// Raw header text, without the trailing delimiter.
    pub header: &'a str,
    /// Everything after the first delimiter.
    pub payload: &'a str,
    /// Clamped, normalised derivation params.
    pub params: DerivationParams,
}

impl ParsedHeader<'_> {
    /// The AAD to authenticate against: the raw header plus delimiter.
    pub fn aad(&self) -> String {
        format!("{}{HEADER_DELIMITER}", self.header)
    }

    /// `true` when the header carries the current format version.
    pub fn is_current(&self) -> bool {
        self.version == FORMAT_VERSION
    }
}

/// Recognise a header at the start of `text`.
///
/// Returns `None` for anything that does not look like a PBKDF2 header; the
/// caller then treats the whole text as a legacy payload. Out-of-range
/// iteration counts are clamped, never rejected.
pub fn parse(text: &str) -> Option<ParsedHeader<'_>> {
    if !text.starts_with(VERSION_TAG) {
        return None;
    }
    let sep = text.find(HEADER_DELIMITER)?;
    let header = &text[..sep];
    let payload = &text[sep + HEADER_DELIMITER.len()..];

    let mut sections = header.split('|');
    let version_part = sections.next().filter(|s| !s.is_empty())?;
    let fields = sections.next().filter(|s| !s.is_empty())?;
    let version = parse_version(version_part.strip_prefix(VERSION_TAG)?)?;

    let mut kdf = None;
    let mut iterations = None;
    let mut hash = None;
    for field in fields.split(';') {
        let mut kv = field.split('=');
        let key = kv.next().unwrap_or_default();
        let value = kv.next();
        match key {
            "k" => kdf = value,
            "i" => iterations = value,
            "h" => hash = value,
            _ => {}
        }
    }

    if kdf != Some(KDF_ID) {
        return None;
    }
    let iterations = match iterations.filter(|s| !s.is_empty()) {
        None => u64::from(DEFAULT_ITERATIONS),
        Some(raw) => parse_iterations(raw)?,
    };
    let hash = HashAlg::normalize(hash.unwrap_or_default());

    Some(ParsedHeader {
        version,
        header,
        payload,
        params: DerivationParams::new(iterations, hash),
    })
}

/// Parse an iteration count written in any numeric form a header may carry
/// (`600000`, `6e5`, `0x927C0`, `150000.5`, `Infinity`). Fractions truncate
/// and out-of-range values clamp; anything non-numeric is `None`.
fn parse_iterations(raw: &str) -> Option<u64> {
    let value = parse_number(raw)?;
    let clamped = value.clamp(f64::from(MIN_ITERATIONS), f64::from(MAX_ITERATIONS));
    // Clamped into u32 range above, so the cast is lossless after truncation.
    Some(clamped.trunc() as u64)
}

/// Version numbers must be non-negative integers once parsed.
fn parse_version(raw: &str) -> Option<u32> {
    let value = parse_number(raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// Lenient numeric parse: surrounding whitespace is ignored, blank is zero,
/// and `0x`/`0o`/`0b` integers, decimal fractions, exponents and signed
/// `Infinity` are accepted. `NaN` is never returned.
fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = raw.strip_prefix(prefix) {
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }
            // Too many digits for u128 is still a finite, huge number.
            let value = u128::from_str_radix(digits, radix).map_or(f64::MAX, |n| n as f64);
            return Some(value);
        }
    }

    let (negative, unsigned) = match raw.as_bytes()[0] {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    if unsigned == "Infinity" {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    // Restrict to plain decimal syntax; `str::parse` alone would also take
    // `inf` and `nan`.
    if !unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        || !unsigned.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.')
    {
        return None;
    }
    let value = unsigned.parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}

/// A complete envelope: derivation params plus the base64url payload of the
/// four-layer sealed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    params: DerivationParams,
    payload: String,
}

impl Envelope {
    pub fn new(params: DerivationParams, payload: impl Into<String>) -> Self {
        Self {
            params,
            payload: payload.into(),
        }
    }

    pub fn params(&self) -> &DerivationParams {
        &self.params
    }

    /// Header text (with delimiter); identical to the AAD used at seal time.
    pub fn header(&self) -> String {
        build(&self.params)
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.header(), self.payload)
    }
}
