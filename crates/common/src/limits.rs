//! Size limits for inputs, envelopes and channel frames.
//!
//! Every frame that can cross the channel is bounded by these constants, so a
//! worker configured with at least [`MIN_FRAME_BYTES`] never sees a valid
//! request or produces a response it cannot frame.

use crate::header::LAYER_COUNT;

/// Longest plaintext accepted for encryption, in characters.
pub const MAX_PLAINTEXT_CHARS: usize = 250_000;

/// Longest secret accepted, in characters.
pub const MAX_SECRET_CHARS: usize = 4_096;

/// Bytes each layer adds: salt (16), IV (12) and tag (16).
pub const LAYER_OVERHEAD_BYTES: usize = 16 + 12 + 16;

/// Largest sealed byte sequence: four UTF-8 bytes per character plus the
/// per-layer overhead.
pub const MAX_SEALED_BYTES: usize = 4 * MAX_PLAINTEXT_CHARS + LAYER_COUNT * LAYER_OVERHEAD_BYTES;

/// Largest base64url payload, counting optional padding.
pub const MAX_PAYLOAD_BYTES: usize = MAX_SEALED_BYTES.div_ceil(3) * 4;

/// Longest raw header (delimiter included) accepted on decrypt. Canonical
/// headers are under 64 bytes.
pub const MAX_HEADER_BYTES: usize = 256;

/// Longest envelope text accepted for decryption, in bytes.
pub const MAX_ENVELOPE_BYTES: usize = MAX_HEADER_BYTES + MAX_PAYLOAD_BYTES;

/// Worst-case JSON size of one string character (`\u00XX`).
const MAX_JSON_BYTES_PER_CHAR: usize = 6;

/// Ids, field names, params and an escaped header.
const FRAME_OVERHEAD_BYTES: usize = MAX_JSON_BYTES_PER_CHAR * MAX_HEADER_BYTES + 4 * 1024;

/// Smallest frame size that fits every request and response the facade can
/// produce. The largest is an encrypt request (or decrypt response) whose
/// plaintext is all control characters.
pub const MIN_FRAME_BYTES: usize =
    MAX_JSON_BYTES_PER_CHAR * (MAX_PLAINTEXT_CHARS + 2 * MAX_SECRET_CHARS) + FRAME_OVERHEAD_BYTES;
