//! Byte-level encodings shared by the batch, table and TTL formats.
//!
//! Fixed-width integers are little-endian. Varints use 7 payload bits per
//! byte with the high bit as a continuation flag, least significant group
//! first.
//!
//! The `get_*` decoders take `&mut &[u8]` and advance the slice past the
//! consumed bytes, returning `None` when the input is truncated or the
//! varint is over-long. Callers decide which error that maps to.

use byteorder::{ByteOrder, LittleEndian};

/// Maximum encoded length of a 32-bit varint.
pub const MAX_VARINT32_BYTES: usize = 5;
/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT64_BYTES: usize = 10;

pub fn put_fixed32(dst: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    dst.extend_from_slice(&buf);
}

pub fn put_fixed64(dst: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, value);
    dst.extend_from_slice(&buf);
}

/// Overwrites 4 bytes at the start of `dst`.
///
/// # Panics
///
/// Panics if `dst` is shorter than 4 bytes.
pub fn encode_fixed32(dst: &mut [u8], value: u32) {
    LittleEndian::write_u32(&mut dst[..4], value);
}

/// Overwrites 8 bytes at the start of `dst`.
///
/// # Panics
///
/// Panics if `dst` is shorter than 8 bytes.
pub fn encode_fixed64(dst: &mut [u8], value: u64) {
    LittleEndian::write_u64(&mut dst[..8], value);
}

/// # Panics
///
/// Panics if `src` is shorter than 4 bytes.
#[must_use]
pub fn decode_fixed32(src: &[u8]) -> u32 {
    LittleEndian::read_u32(&src[..4])
}

/// # Panics
///
/// Panics if `src` is shorter than 8 bytes.
#[must_use]
pub fn decode_fixed64(src: &[u8]) -> u64 {
    LittleEndian::read_u64(&src[..8])
}

pub fn put_varint32(dst: &mut Vec<u8>, value: u32) {
    put_varint64(dst, u64::from(value));
}

pub fn put_varint64(dst: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        dst.push((value as u8) | 0x80);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Number of bytes `value` occupies when varint-encoded.
#[must_use]
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn get_varint64(input: &mut &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    for (i, &byte) in input.iter().enumerate().take(MAX_VARINT64_BYTES) {
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *input = &input[i + 1..];
            return Some(result);
        }
    }
    None
}

pub fn get_varint32(input: &mut &[u8]) -> Option<u32> {
    let mut probe = *input;
    let mut result: u64 = 0;
    for i in 0..MAX_VARINT32_BYTES {
        let (&byte, rest) = probe.split_first()?;
        probe = rest;
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            let value = u32::try_from(result).ok()?;
            *input = probe;
            return Some(value);
        }
    }
    None
}

/// Appends `varint32(len) || bytes`.
pub fn put_length_prefixed_slice(dst: &mut Vec<u8>, bytes: &[u8]) {
    put_varint32(dst, bytes.len() as u32);
    dst.extend_from_slice(bytes);
}

/// Reads a `varint32(len) || bytes` field, advancing `input`.
pub fn get_length_prefixed_slice<'a>(input: &mut &'a [u8]) -> Option<&'a [u8]> {
    let mut probe = *input;
    let len = get_varint32(&mut probe)? as usize;
    if probe.len() < len {
        return None;
    }
    let (field, rest) = probe.split_at(len);
    *input = rest;
    Some(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_width_is_little_endian() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0x0403_0201);
        put_fixed64(&mut buf, 0x0807_0605_0403_0201);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf[4..], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(decode_fixed32(&buf), 0x0403_0201);
        assert_eq!(decode_fixed64(&buf[4..]), 0x0807_0605_0403_0201);
    }

    #[test]
    fn varint_boundaries() {
        for &v in &[0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint64(&mut buf, v);
            assert_eq!(buf.len(), varint_length(v));
            let mut input = buf.as_slice();
            assert_eq!(get_varint64(&mut input), Some(v));
            assert!(input.is_empty());
        }
    }

    #[test]
    fn varint32_rejects_overflowing_encoding() {
        let mut buf = Vec::new();
        put_varint64(&mut buf, u64::from(u32::MAX) + 1);
        let mut input = buf.as_slice();
        assert_eq!(get_varint32(&mut input), None);
    }

    #[test]
    fn truncated_varint_leaves_input_untouched() {
        let buf = [0x80u8, 0x80];
        let mut input = &buf[..];
        assert_eq!(get_varint64(&mut input), None);
        assert_eq!(get_varint32(&mut input), None);
        assert_eq!(input.len(), 2);
    }

    #[test]
    fn length_prefixed_slice_detects_truncation() {
        let mut buf = Vec::new();
        put_length_prefixed_slice(&mut buf, b"hello");
        put_length_prefixed_slice(&mut buf, b"");

        let mut input = buf.as_slice();
        assert_eq!(get_length_prefixed_slice(&mut input), Some(&b"hello"[..]));
        assert_eq!(get_length_prefixed_slice(&mut input), Some(&b""[..]));
        assert!(input.is_empty());

        let mut short = &buf[..4];
        assert_eq!(get_length_prefixed_slice(&mut short), None);
    }

    proptest! {
        #[test]
        fn decoders_never_overrun_arbitrary_input(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut input = bytes.as_slice();
            match get_varint64(&mut input) {
                Some(v) => {
                    let consumed = bytes.len() - input.len();
                    prop_assert!(consumed >= varint_length(v));
                    prop_assert!(consumed <= MAX_VARINT64_BYTES);
                }
                None => prop_assert_eq!(input.len(), bytes.len()),
            }

            let mut input = bytes.as_slice();
            if let Some(field) = get_length_prefixed_slice(&mut input) {
                prop_assert!(input.len() + field.len() < bytes.len());
            } else {
                prop_assert_eq!(input.len(), bytes.len());
            }
        }
    }
}
