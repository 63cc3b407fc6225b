//! [`Secret`]: transport wrapper for user-supplied secret text.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret text on its way into the isolated worker.
///
/// Serialises transparently as a JSON string. The heap buffer is overwritten
/// with zeroes on drop; copies already made by the allocator or by a
/// serialiser cannot be reached, so this is best-effort hygiene rather than a
/// guarantee.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` if empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even in debug builds.
        f.write_str("Secret([REDACTED])")
    }
}
