//! # Canonical Encoding
//!
//! The normalization contract behind every digest in the engine.
//!
//! ## Format
//!
//! ```text
//! integers : little-endian, fixed width
//! f64      : IEEE-754 bits, little-endian (all NaNs collapse to one pattern)
//! bool     : 1 byte, 0 or 1
//! char     : u32 scalar value
//! string   : [4 bytes: byte length][N bytes: UTF-8]
//! sequence : [4 bytes: element count][elements...]
//! enum     : [1 byte: tag][fields...]
//! ```
//!
//! Two values that compare equal always encode to the same bytes. Changing
//! any rule here changes every commit hash and must bump the object format
//! version in `megalith_history`.

use crate::error::DecodeError;

/// Bit pattern every NaN is normalized to before hashing.
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// Types with a canonical byte form.
pub trait Encode {
    /// Appends the canonical bytes of `self`.
    fn encode(&self, enc: &mut Encoder);

    /// Convenience: encodes into a fresh buffer.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.into_bytes()
    }
}

/// Types that can be read back from their canonical bytes.
pub trait Decode: Sized {
    /// Reads one value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] on truncated input or unknown tags.
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError>;

    /// Decodes a complete buffer, rejecting trailing bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] on malformed input.
    fn from_canonical_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut dec = Decoder::new(data);
        let value = Self::decode(&mut dec)?;
        dec.finish()?;
        Ok(value)
    }
}

/// Append-only canonical writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with pre-reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Writes raw bytes with no length prefix.
    #[inline]
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a `u8`.
    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Writes a `u32`.
    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `u64`.
    #[inline]
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an `f64`, normalizing NaN.
    #[inline]
    pub fn put_f64(&mut self, value: f64) {
        let bits = if value.is_nan() {
            CANONICAL_NAN
        } else {
            value.to_bits()
        };
        self.put_u64(bits);
    }

    /// Writes a `bool`.
    #[inline]
    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    /// Writes a `char`.
    #[inline]
    pub fn put_char(&mut self, value: char) {
        self.put_u32(u32::from(value));
    }

    /// Writes a length prefix.
    ///
    /// Lengths above `u32::MAX` cannot occur for in-memory engine data; they
    /// saturate rather than wrap.
    #[inline]
    pub fn put_len(&mut self, len: usize) {
        self.put_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, value: &str) {
        self.put_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Writes a length-prefixed sequence.
    pub fn put_seq<T: Encode>(&mut self, items: &[T]) {
        self.put_len(items.len());
        for item in items {
            item.encode(self);
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrows the written bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the encoder.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over canonical bytes.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Starts decoding at the beginning of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fails if any input is left.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TrailingBytes`].
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.remaining()))
        }
    }

    /// Takes `n` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] if fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a `u8`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] on truncated input.
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] on truncated input.
    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Reads a `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] on truncated input.
    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Reads an `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] on truncated input.
    pub fn f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.u64()?))
    }

    /// Reads a `bool`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidTag`] for bytes other than 0 and 1.
    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidTag {
                what: "bool",
                tag: u32::from(tag),
            }),
        }
    }

    /// Reads a `char`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidTag`] for values that are not scalar values.
    pub fn char(&mut self) -> Result<char, DecodeError> {
        let raw = self.u32()?;
        char::from_u32(raw).ok_or(DecodeError::InvalidTag {
            what: "char",
            tag: raw,
        })
    }

    /// Reads a length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] on truncated input.
    pub fn len(&mut self) -> Result<usize, DecodeError> {
        Ok(self.u32()? as usize)
    }

    /// Reads a length-prefixed string.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] on truncation or invalid UTF-8.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a length-prefixed sequence.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] from any element.
    pub fn seq<T: Decode>(&mut self) -> Result<Vec<T>, DecodeError> {
        let len = self.len()?;
        // Never trust a length prefix for the allocation size.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_str(self);
    }
}

impl Decode for String {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_layout() {
        let mut enc = Encoder::new();
        enc.put_u32(1);
        enc.put_bool(true);
        enc.put_str("ab");
        assert_eq!(enc.as_bytes(), &[1, 0, 0, 0, 1, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn test_nan_is_normalized() {
        let mut a = Encoder::new();
        let mut b = Encoder::new();
        a.put_f64(f64::NAN);
        b.put_f64(-f64::NAN);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_truncated_input() {
        let mut dec = Decoder::new(&[1, 2]);
        assert_eq!(
            dec.u32(),
            Err(DecodeError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut enc = Encoder::new();
        enc.put_str("tool");
        enc.put_u8(9);
        assert_eq!(
            String::from_canonical_bytes(enc.as_bytes()),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_oversized_length_prefix() {
        let mut enc = Encoder::new();
        enc.put_u32(u32::MAX);
        let mut dec = Decoder::new(enc.as_bytes());
        assert!(dec.seq::<String>().is_err());
    }
}
