//! # Object Framing
//!
//! Persisted objects use git's framing:
//!
//! ```text
//! "<type> <payload length in decimal>\0<payload>"
//! ```
//!
//! and an object's id is the SHA-256 of the framed bytes.

use std::fmt;

use megalith_core::{DecodeError, Digest};

/// Kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A [`crate::Commit`].
    Commit,
    /// A canonical World encoding.
    Snapshot,
}

impl ObjectKind {
    /// The type word in the frame header.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Snapshot => "snapshot",
        }
    }

    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"commit" => Some(Self::Commit),
            b"snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frames `payload` as a `kind` object.
#[must_use]
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.name(), payload.len());
    let mut framed = Vec::with_capacity(header.len() + payload.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Id of the object `frame(kind, payload)`, without building the frame.
#[must_use]
pub fn object_id(kind: ObjectKind, payload: &[u8]) -> Digest {
    let header = format!("{} {}\0", kind.name(), payload.len());
    Digest::of_parts(&[header.as_bytes(), payload])
}

/// Splits framed bytes into kind and payload.
///
/// # Errors
///
/// [`DecodeError::InvalidTag`] for an unknown type or a malformed header,
/// [`DecodeError::UnexpectedEof`] / [`DecodeError::TrailingBytes`] if the
/// declared length does not match.
pub fn unframe(framed: &[u8]) -> Result<(ObjectKind, &[u8]), DecodeError> {
    let malformed = DecodeError::InvalidTag {
        what: "object header",
        tag: 0,
    };
    let nul = framed
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| malformed.clone())?;
    let header = &framed[..nul];
    let payload = &framed[nul + 1..];

    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| malformed.clone())?;
    let kind = ObjectKind::from_name(&header[..space]).ok_or_else(|| malformed.clone())?;
    let declared: usize = std::str::from_utf8(&header[space + 1..])
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(malformed)?;

    match payload.len().cmp(&declared) {
        std::cmp::Ordering::Equal => Ok((kind, payload)),
        std::cmp::Ordering::Less => Err(DecodeError::UnexpectedEof {
            needed: declared,
            remaining: payload.len(),
        }),
        std::cmp::Ordering::Greater => Err(DecodeError::TrailingBytes(payload.len() - declared)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        assert_eq!(frame(ObjectKind::Commit, b"abc"), b"commit 3\0abc".to_vec());
    }

    #[test]
    fn test_id_is_hash_of_frame() {
        let framed = frame(ObjectKind::Snapshot, b"world");
        assert_eq!(object_id(ObjectKind::Snapshot, b"world"), Digest::of(&framed));
    }

    #[test]
    fn test_kind_is_part_of_the_id() {
        assert_ne!(
            object_id(ObjectKind::Commit, b"x"),
            object_id(ObjectKind::Snapshot, b"x")
        );
    }

    #[test]
    fn test_unframe() {
        let framed = frame(ObjectKind::Commit, b"payload");
        let (kind, payload) = unframe(&framed).unwrap();
        assert_eq!(kind, ObjectKind::Commit);
        assert_eq!(payload, b"payload");

        assert!(unframe(b"blob 1\0x").is_err());
        assert!(unframe(b"commit 5\0abc").is_err());
        assert!(unframe(b"commit 1\0abc").is_err());
        assert!(unframe(b"commit").is_err());
    }
}
