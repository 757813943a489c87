//! Little-endian binary primitives shared by the entry and command codecs
//!
//! Every encodable type reports its exact encoded length up front so the
//! writer can verify that the bytes produced match the estimate. Decoding
//! distinguishes running out of bytes from reading bytes that make no sense.

use thiserror::Error;

/// Failure while decoding a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ends before the record does. At the tail of the active file
    /// this is an append that never completed, not corruption.
    #[error("insufficient bytes: needed {needed}, available {available}")]
    Insufficient { needed: usize, available: usize },

    /// The bytes are present but do not form a valid record.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::Malformed(reason.into())
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, DecodeError::Insufficient { .. })
    }
}

/// Appends encoded values to a byte buffer
pub struct Encoder<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Length prefix for strings, blobs and vectors.
    pub fn put_len(&mut self, len: usize) {
        self.put_u32(len as u32);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_bytes(s.as_bytes());
    }

    /// Bytes written to the underlying buffer so far
    pub fn written(&self) -> usize {
        self.buf.len()
    }
}

/// Cursor over an encoded byte slice
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Insufficient {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Reads a length prefix, rejecting lengths that cannot fit in what is left
    /// when each element occupies at least `min_elem_size` bytes.
    pub fn get_len(&mut self, min_elem_size: usize) -> Result<usize, DecodeError> {
        let len = self.get_u32()? as usize;
        if len.saturating_mul(min_elem_size) > self.remaining() {
            return Err(DecodeError::malformed(format!(
                "length prefix {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len)
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.get_len(1)?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn get_str(&mut self) -> Result<String, DecodeError> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes).map_err(|e| DecodeError::malformed(format!("invalid utf-8: {}", e)))
    }
}

/// A value with a fixed-size-computable binary encoding
pub trait WalCodec: Sized {
    /// Exact number of bytes `encode` will produce
    fn encoded_size(&self) -> usize;

    fn encode(&self, enc: &mut Encoder<'_>);

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError>;

    /// Smallest possible encoding, used to sanity-check length prefixes
    fn min_encoded_size() -> usize {
        1
    }
}

impl WalCodec for u16 {
    fn encoded_size(&self) -> usize {
        2
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_u16(*self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.get_u16()
    }
    fn min_encoded_size() -> usize {
        2
    }
}

impl WalCodec for u32 {
    fn encoded_size(&self) -> usize {
        4
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_u32(*self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.get_u32()
    }
    fn min_encoded_size() -> usize {
        4
    }
}

impl WalCodec for u64 {
    fn encoded_size(&self) -> usize {
        8
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_u64(*self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.get_u64()
    }
    fn min_encoded_size() -> usize {
        8
    }
}

impl WalCodec for String {
    fn encoded_size(&self) -> usize {
        4 + self.len()
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_str(self);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.get_str()
    }
    fn min_encoded_size() -> usize {
        4
    }
}

impl<T: WalCodec> WalCodec for Vec<T> {
    fn encoded_size(&self) -> usize {
        4 + self.iter().map(WalCodec::encoded_size).sum::<usize>()
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_len(self.len());
        for item in self {
            item.encode(enc);
        }
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let len = dec.get_len(T::min_encoded_size())?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(dec)?);
        }
        Ok(items)
    }
    fn min_encoded_size() -> usize {
        4
    }
}

/// Implements [`WalCodec`] for a struct by encoding its fields in order.
macro_rules! wal_record {
    ($name:ident { $($field:ident),* $(,)? }) => {
        impl $crate::wal::codec::WalCodec for $name {
            fn encoded_size(&self) -> usize {
                0 $(+ $crate::wal::codec::WalCodec::encoded_size(&self.$field))*
            }
            fn encode(&self, enc: &mut $crate::wal::codec::Encoder<'_>) {
                $($crate::wal::codec::WalCodec::encode(&self.$field, enc);)*
            }
            fn decode(
                dec: &mut $crate::wal::codec::Decoder<'_>,
            ) -> Result<Self, $crate::wal::codec::DecodeError> {
                Ok(Self {
                    $($field: $crate::wal::codec::WalCodec::decode(dec)?,)*
                })
            }
        }
    };
}

pub(crate) use wal_record;
