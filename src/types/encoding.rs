//! Binary encoding and decoding traits for the wire schema.
//!
//! # Binary Format
//!
//! - Integers: little-endian, fixed-width
//! - `bool`: single byte (0 = false, 1 = true)
//! - `Vec<T>`: 4-byte little-endian element count followed by the elements
//! - Enums (via `#[derive(BinaryCodec)]`): 1-byte variant tag, then the fields
//! - Structs (via `#[derive(BinaryCodec)]`): fields in declaration order
//!
//! The format is deterministic, so encoded bytes can be hashed to produce
//! stable fingerprints.

use thiserror::Error;

/// Maximum element count accepted when decoding a vector.
pub const MAX_VEC_LEN: usize = 1_000_000;

/// Sink for writing encoded bytes.
///
/// Implemented by byte buffers and by the hash builder so values can be
/// fingerprinted without an intermediate allocation.
pub trait EncodeSink {
    /// Writes the given bytes to the sink.
    fn write(&mut self, bytes: &[u8]);
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Counts encoded bytes without storing them.
#[derive(Default)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    /// Returns the total number of bytes counted.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

/// Types that can be serialized to the binary format.
pub trait Encode {
    /// Writes the binary representation to the given sink.
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Returns the number of bytes `encode` would write.
    fn encoded_len(&self) -> usize {
        let mut counter = SizeCounter::default();
        self.encode(&mut counter);
        counter.len()
    }

    /// Serializes into a new buffer allocated with the exact size.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }
}

/// Errors that can occur during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before expected data was read.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// Data does not represent a valid value for the target type.
    #[error("invalid value")]
    InvalidValue,
    /// Length prefix exceeds the maximum allowed size.
    #[error("length prefix exceeds limit")]
    LengthOverflow,
}

/// Types that can be deserialized from the binary format.
pub trait Decode: Sized {
    /// Reads a value from the front of `input`, advancing it past the consumed bytes.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value that must span all of `data`.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;
        if !input.is_empty() {
            return Err(DecodeError::InvalidValue);
        }
        Ok(value)
    }
}

fn take<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    let (head, rest) = input
        .split_first_chunk::<N>()
        .ok_or(DecodeError::UnexpectedEof)?;
    *input = rest;
    Ok(*head)
}

macro_rules! impl_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    Ok(<$t>::from_le_bytes(take(input)?))
                }
            }
        )*
    };
}

impl_int!(u8, u16, u32, u64);

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[u8::from(*self)]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        // Counts beyond MAX_VEC_LEN never decode, so truncation cannot round-trip silently.
        (self.len() as u32).encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = u32::decode(input)? as usize;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::LengthOverflow);
        }
        // Every element is at least one byte wide.
        if len > input.len() {
            return Err(DecodeError::UnexpectedEof);
        }

        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(input)?);
        }
        Ok(items)
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        take(input)
    }
}
