//! # Content Digests
//!
//! A [`Digest`] is the SHA-256 of some canonical byte string. World digests,
//! commit ids and persisted object ids are all digests.

use sha2::{Digest as _, Sha256};
use std::fmt;

use crate::encoding::{Decode, Decoder, Encode, Encoder};
use crate::error::DecodeError;

/// 32-byte content address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The all-zero digest. Used as the parent of the genesis commit.
    pub const ZERO: Self = Self([0; 32]);

    /// Wraps raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hashes `data` in one shot.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hashes several byte strings as if they were concatenated.
    #[must_use]
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses the hex form produced by [`Digest::to_hex`].
    ///
    /// Returns `None` for anything that is not exactly 64 hex characters.
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text.trim(), &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// The first 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl Encode for Digest {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_raw(&self.0);
    }
}

impl Decode for Digest {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(dec.take(32)?);
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let digest = Digest::of(b"megalith");
        let parsed = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(parsed, digest);
        assert_eq!(digest.to_hex().len(), 64);
    }

    #[test]
    fn test_parts_match_concatenation() {
        assert_eq!(Digest::of_parts(&[b"mega", b"lith"]), Digest::of(b"megalith"));
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            Digest::of(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(Digest::from_hex("zz").is_none());
        assert!(Digest::from_hex(&"a".repeat(63)).is_none());
    }
}
