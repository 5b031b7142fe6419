//! Content-addressed fingerprints.
//!
//! A [`Fingerprint`] is the lowercase hex SHA-256 of the exact submitted
//! bytes. No normalization is applied: re-encoding a file, or changing a
//! single byte, produces a different fingerprint. Near-duplicate detection
//! is the job of [`crate::model`] and [`crate::index`].
//!
//! # Example
//!
//! ```rust
//! use copycat_core::fingerprint::fingerprint;
//!
//! let fp = fingerprint(b"The quick brown fox");
//! assert_eq!(fp.as_str().len(), 64);
//! assert_eq!(fp, fingerprint(b"The quick brown fox"));
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest of a submission's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a digest read back from storage. The value is lowercased so that
    /// comparisons against freshly computed fingerprints stay exact.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic() {
        let a = fingerprint(b"same bytes");
        let b = fingerprint(b"same bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_byte_difference() {
        let a = fingerprint(b"The quick brown fox\n");
        let b = fingerprint(b"The quick brown fox\r\n");
        assert_ne!(a, b);
    }

    #[test]
    fn test_lowercase_hex() {
        let fp = fingerprint(&[0xff, 0x00, 0x7f]);
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_from_hex_lowercases() {
        let fp = fingerprint(b"abc");
        let stored = Fingerprint::from_hex(fp.as_str().to_uppercase());
        assert_eq!(stored, fp);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let fp = fingerprint(b"abc");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
    }
}
