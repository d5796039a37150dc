//! Compact variable-length integers (C32 / C64).
//!
//! Values are split into 7-bit groups and written most-significant group first.
//! Every byte except the last has its high bit set. A 32-bit value takes 1 to 5
//! bytes, a 64-bit value 1 to 10 bytes, and the encoding is always the shortest
//! one possible.

use lumen_common::{Result, error::Error};

/// Maximum encoded size of a C32 value.
pub const C32_MAX_BYTES: usize = 5;

/// Maximum encoded size of a C64 value.
pub const C64_MAX_BYTES: usize = 10;

/// Number of bytes `value` occupies when encoded as C32.
pub fn c32_len(value: u32) -> usize {
    c64_len(value as u64)
}

/// Number of bytes `value` occupies when encoded as C64.
pub fn c64_len(value: u64) -> usize {
    let bits = (u64::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(7).max(1)
}

/// Encodes `value` into the tail of `buf` and returns the encoded bytes.
pub fn encode_c32(value: u32, buf: &mut [u8; C32_MAX_BYTES]) -> &[u8] {
    let start = encode_tail(value as u64, buf);
    &buf[start..]
}

/// Encodes `value` into the tail of `buf` and returns the encoded bytes.
pub fn encode_c64(value: u64, buf: &mut [u8; C64_MAX_BYTES]) -> &[u8] {
    let start = encode_tail(value, buf);
    &buf[start..]
}

fn encode_tail(mut value: u64, buf: &mut [u8]) -> usize {
    let mut pos = buf.len() - 1;
    buf[pos] = (value & 0x7f) as u8;
    value >>= 7;
    while value != 0 {
        pos -= 1;
        buf[pos] = (value & 0x7f) as u8 | 0x80;
        value >>= 7;
    }
    pos
}

/// Decodes a C32 value from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_c32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, len) = decode_slice(CompactDecoder::c32(), bytes)?;
    Ok((value as u32, len))
}

/// Decodes a C64 value from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_c64(bytes: &[u8]) -> Result<(u64, usize)> {
    decode_slice(CompactDecoder::c64(), bytes)
}

fn decode_slice(mut decoder: CompactDecoder, bytes: &[u8]) -> Result<(u64, usize)> {
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(value) = decoder.push(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(Error::end_of_stream(
        bytes.len() as u64,
        1,
        bytes.len() as u64,
    ))
}

/// Incremental decoder fed one byte at a time.
///
/// Rejects encodings that run longer than the maximum size for the width, or
/// whose groups overflow the width.
pub(crate) struct CompactDecoder {
    value: u64,
    count: usize,
    width: u32,
}

impl CompactDecoder {
    pub(crate) fn c32() -> CompactDecoder {
        CompactDecoder {
            value: 0,
            count: 0,
            width: 32,
        }
    }

    pub(crate) fn c64() -> CompactDecoder {
        CompactDecoder {
            value: 0,
            count: 0,
            width: 64,
        }
    }

    fn max_bytes(&self) -> usize {
        if self.width == 32 {
            C32_MAX_BYTES
        } else {
            C64_MAX_BYTES
        }
    }

    fn max_value(&self) -> u64 {
        if self.width == 32 {
            u32::MAX as u64
        } else {
            u64::MAX
        }
    }

    /// Consumes one byte. Returns the decoded value once the terminating byte
    /// has been seen.
    pub(crate) fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        self.count += 1;
        if self.count > self.max_bytes() || self.value > (self.max_value() >> 7) {
            return Err(Error::malformed_varint(self.width));
        }
        self.value = (self.value << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            Ok(Some(self.value))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use lumen_common::error::ErrorKind;

    use super::{
        C32_MAX_BYTES, C64_MAX_BYTES, c32_len, c64_len, decode_c32, decode_c64, encode_c32,
        encode_c64,
    };

    #[test]
    fn test_known_encodings() {
        let mut buf = [0u8; C32_MAX_BYTES];
        assert_eq!(encode_c32(0, &mut buf), &[0x00]);
        assert_eq!(encode_c32(1, &mut buf), &[0x01]);
        assert_eq!(encode_c32(127, &mut buf), &[0x7f]);
        assert_eq!(encode_c32(128, &mut buf), &[0x81, 0x00]);
        assert_eq!(encode_c32(300, &mut buf), &[0x82, 0x2c]);
        assert_eq!(encode_c32(16384, &mut buf), &[0x81, 0x80, 0x00]);
        assert_eq!(encode_c32(u32::MAX, &mut buf), &[0x8f, 0xff, 0xff, 0xff, 0x7f]);

        let mut buf = [0u8; C64_MAX_BYTES];
        assert_eq!(encode_c64(u64::MAX, &mut buf).len(), 10);
        assert_eq!(encode_c64(u64::MAX, &mut buf)[0], 0x81);
    }

    #[test]
    fn test_minimal_length() {
        for (value, len) in [
            (0u64, 1),
            (0x7f, 1),
            (0x80, 2),
            (0x3fff, 2),
            (0x4000, 3),
            (u32::MAX as u64, 5),
            (1 << 35, 6),
            (u64::MAX, 10),
        ] {
            assert_eq!(c64_len(value), len, "{value:#x}");
            let mut buf = [0u8; C64_MAX_BYTES];
            assert_eq!(encode_c64(value, &mut buf).len(), len);
        }
        assert_eq!(c32_len(u32::MAX), 5);
    }

    #[test]
    fn test_roundtrip_boundaries() {
        let mut rng = fastrand::Rng::with_seed(42);
        let mut values32 = vec![0u32, 1, 127, 128, 16383, 16384, u32::MAX - 1, u32::MAX];
        values32.extend((0..1000).map(|_| rng.u32(..) >> rng.u32(0..32)));
        for value in values32 {
            let mut buf = [0u8; C32_MAX_BYTES];
            let encoded = encode_c32(value, &mut buf).to_vec();
            assert_eq!(decode_c32(&encoded).unwrap(), (value, encoded.len()));
        }

        let mut values64 = vec![0u64, 1, u32::MAX as u64 + 1, u64::MAX - 1, u64::MAX];
        values64.extend((0..1000).map(|_| rng.u64(..) >> rng.u32(0..64)));
        for value in values64 {
            let mut buf = [0u8; C64_MAX_BYTES];
            let encoded = encode_c64(value, &mut buf).to_vec();
            assert_eq!(decode_c64(&encoded).unwrap(), (value, encoded.len()));
        }
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        assert_eq!(decode_c32(&[0x82, 0x2c, 0xff, 0xff]).unwrap(), (300, 2));
    }

    #[test]
    fn test_malformed() {
        let err = decode_c32(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedVarint { width: 32 }));

        // Five groups whose leading group carries more than 4 bits overflow 32 bits.
        let err = decode_c32(&[0x90, 0x80, 0x80, 0x80, 0x00]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedVarint { width: 32 }));

        let err = decode_c64(&[0xff; 11]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedVarint { width: 64 }));

        let err = decode_c64(&[0x82, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00])
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedVarint { width: 64 }));
    }

    #[test]
    fn test_truncated() {
        let err = decode_c32(&[0x81, 0x80]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::EndOfStream { .. }));
        let err = decode_c64(&[]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::EndOfStream { .. }));
    }
}
