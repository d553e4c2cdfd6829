// src/feature/codec.rs

//! Byte-level codecs for the compact feature vector.
//!
//! Each entry is a feature-id delta followed by a tagged value:
//!
//! ```text
//! entry  = varint(id - previous_id) value
//! varint = LEB128: 7 payload bits per byte, high bit set on all but the last byte
//! value  = tag payload
//! tag    = kind (high nibble) | payload size in bytes (low nibble)
//!          0x10 raw f64, little endian, size 8
//!          0x20 unsigned magnitude, big endian, size 1..=8
//!          0x40 negative magnitude, big endian, size 1..=8
//! ```
//!
//! Integral values use the fewest magnitude bytes that hold them; anything
//! else (fractions, infinities, NaN, |v| >= 2^63) is stored raw.

use crate::error::CodecError;

pub const TAG_FLOAT: u8 = 1 << 4;
pub const TAG_UNSIGNED: u8 = 1 << 5;
pub const TAG_SIGNED: u8 = 1 << 6;
pub const SIZE_MASK: u8 = 0x0f;

const RAW_SIZE: usize = std::mem::size_of::<f64>();

/// 2^63, the first magnitude that no longer round-trips through `i64`.
const INTEGRAL_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Appends `value` as a LEB128 varint. Returns the number of bytes written.
pub fn encode_id(out: &mut Vec<u8>, mut value: u64) -> usize {
    let start = out.len();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out.len() - start
}

/// Decodes a varint starting at `pos`. Returns the value and the position after it.
pub fn decode_id(buf: &[u8], mut pos: usize) -> Result<(u64, usize), CodecError> {
    let start = pos;
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *buf.get(pos).ok_or(CodecError::Truncated { offset: pos })?;
        pos += 1;

        let payload = u64::from(byte & 0x7f);
        if (shift == 63 && payload > 1) || shift > 63 {
            return Err(CodecError::VarintOverflow { offset: start });
        }
        value |= payload << shift;

        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
        shift += 7;
    }
}

/// Number of big-endian bytes needed for `magnitude`, at least one.
pub fn magnitude_size(magnitude: u64) -> usize {
    let bits = 64 - magnitude.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Appends a tagged value. Returns the number of bytes written.
pub fn encode_value(out: &mut Vec<u8>, value: f64) -> usize {
    if value.fract() == 0.0 && value.abs() < INTEGRAL_LIMIT {
        let magnitude = value.abs() as u64;
        let size = magnitude_size(magnitude);
        let kind = if value < 0.0 { TAG_SIGNED } else { TAG_UNSIGNED };

        out.push(kind | (size as u8 & SIZE_MASK));
        out.extend_from_slice(&magnitude.to_be_bytes()[8 - size..]);
        size + 1
    } else {
        out.push(TAG_FLOAT | (RAW_SIZE as u8 & SIZE_MASK));
        out.extend_from_slice(&value.to_le_bytes());
        RAW_SIZE + 1
    }
}

/// Decodes a tagged value starting at `pos`. Returns the value and the position after it.
pub fn decode_value(buf: &[u8], pos: usize) -> Result<(f64, usize), CodecError> {
    let tag = *buf.get(pos).ok_or(CodecError::Truncated { offset: pos })?;
    let size = (tag & SIZE_MASK) as usize;
    let kind = tag & !SIZE_MASK;
    let payload_start = pos + 1;

    let invalid = CodecError::InvalidTag { tag, offset: pos };
    let payload = |len: usize| {
        buf.get(payload_start..payload_start + len)
            .ok_or(CodecError::Truncated { offset: buf.len() })
    };

    match kind {
        TAG_FLOAT if size == RAW_SIZE => {
            let mut raw = [0u8; RAW_SIZE];
            raw.copy_from_slice(payload(RAW_SIZE)?);
            Ok((f64::from_le_bytes(raw), payload_start + RAW_SIZE))
        }
        TAG_UNSIGNED | TAG_SIGNED if (1..=8).contains(&size) => {
            let mut raw = [0u8; 8];
            raw[8 - size..].copy_from_slice(payload(size)?);
            let magnitude = u64::from_be_bytes(raw) as f64;
            let value = if kind == TAG_SIGNED { -magnitude } else { magnitude };
            Ok((value, payload_start + size))
        }
        _ => Err(invalid),
    }
}
