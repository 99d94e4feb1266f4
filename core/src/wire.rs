//! Canonical serializer (spec §4.2).
//!
//! Every domain type implements [`CanonicalSerialize`] by hand rather than
//! deriving through a general-purpose serde backend: hashing (and therefore
//! chain identity) is defined in terms of *this* encoding, so it must stay
//! fixed independently of any such backend's internal wire format from one
//! version to the next.
//!
//! Rules:
//! - fixed-width integers: little-endian
//! - variable-length integers: unsigned LEB128
//! - sequences: LEB128 length prefix, then each element's encoding
//! - fixed-size arrays: concatenated, no length prefix
//! - sum types: one discriminant byte, then the variant's payload
//!
//! Round-trip law: `decode(encode(x)) == x` for every domain type
//! (spec §8).

use crate::error::{Error, Result};

/// A type that can be deterministically turned into bytes and back.
pub trait CanonicalSerialize: Sized {
    /// Appends this value's canonical encoding to `out`.
    fn canonical_write(&self, out: &mut Vec<u8>);

    /// Decodes a value from the front of `buf`, returning it along with the
    /// number of bytes consumed.
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)>;

    /// Convenience wrapper returning a freshly allocated buffer.
    fn canonical_encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.canonical_write(&mut out);
        out
    }

    /// Convenience wrapper decoding a value that is expected to consume the
    /// entire buffer.
    fn canonical_decode(buf: &[u8]) -> Result<Self> {
        let (value, consumed) = Self::canonical_read(buf)?;
        if consumed != buf.len() {
            return Err(Error::MalformedWire(format!(
                "trailing bytes after decode: consumed {consumed} of {}",
                buf.len()
            )));
        }
        Ok(value)
    }
}

/// Writes `value` as unsigned LEB128.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Reads an unsigned LEB128 value from the front of `buf`.
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(Error::MalformedWire("varint too long".into()));
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(Error::MalformedWire("truncated varint".into()))
}

fn need(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        Err(Error::MalformedWire(format!(
            "need {len} bytes, have {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

impl CanonicalSerialize for u8 {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        need(buf, 1)?;
        Ok((buf[0], 1))
    }
}

macro_rules! impl_fixed_int {
    ($t:ty) => {
        impl CanonicalSerialize for $t {
            fn canonical_write(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
            fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
                let n = std::mem::size_of::<$t>();
                need(buf, n)?;
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                bytes.copy_from_slice(&buf[..n]);
                Ok((<$t>::from_le_bytes(bytes), n))
            }
        }
    };
}

impl_fixed_int!(u16);
impl_fixed_int!(u32);
impl_fixed_int!(u64);

/// `u64` values encoded as length-prefixed variable-length integers rather
/// than fixed 8-byte little-endian. Most protocol counts (heights, amounts)
/// go through [`VarU64`] so small values stay small on the wire; the raw
/// `u64` impl above is kept for fields the spec pins to a fixed width (the
/// UTXO-key pre-image `output_index_as_LE_u64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarU64(pub u64);

impl CanonicalSerialize for VarU64 {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        write_varint(out, self.0);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (v, n) = read_varint(buf)?;
        Ok((VarU64(v), n))
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Vec<T> {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        write_varint(out, self.len() as u64);
        for item in self {
            item.canonical_write(out);
        }
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (len, mut offset) = read_varint(buf)?;
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let (item, consumed) = T::canonical_read(&buf[offset..])?;
            items.push(item);
            offset += consumed;
        }
        Ok((items, offset))
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Option<T> {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(value) => {
                out.push(1);
                value.canonical_write(out);
            }
        }
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        need(buf, 1)?;
        match buf[0] {
            0 => Ok((None, 1)),
            1 => {
                let (value, consumed) = T::canonical_read(&buf[1..])?;
                Ok((Some(value), consumed + 1))
            }
            other => Err(Error::MalformedWire(format!(
                "bad Option discriminant {other}"
            ))),
        }
    }
}

/// A fixed-size byte array, concatenated with no length prefix per §4.2.
impl<const N: usize> CanonicalSerialize for [u8; N] {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        need(buf, N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(&buf[..N]);
        Ok((array, N))
    }
}
