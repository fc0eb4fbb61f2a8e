//! Bitcoin's variable-length integer encoding (§4.1 / GLOSSARY).
//!
//! `value < 0xFD` is one byte; otherwise a prefix byte (`0xFD`/`0xFE`/`0xFF`)
//! selects a 2/4/8-byte little-endian value. Decoding rejects encodings that
//! are not minimal for the value they carry.

use bytes::{Buf, BufMut};

use crate::error::{PeerError, PeerResult};

pub fn encode(value: u64, out: &mut impl BufMut) {
    match value {
        v if v < 0xFD => out.put_u8(v as u8),
        v if v <= 0xFFFF => {
            out.put_u8(0xFD);
            out.put_u16_le(v as u16);
        }
        v if v <= 0xFFFF_FFFF => {
            out.put_u8(0xFE);
            out.put_u32_le(v as u32);
        }
        v => {
            out.put_u8(0xFF);
            out.put_u64_le(v);
        }
    }
}

pub fn encoded_len(value: u64) -> usize {
    match value {
        v if v < 0xFD => 1,
        v if v <= 0xFFFF => 3,
        v if v <= 0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Decodes a varint from the front of `buf`, advancing it past the bytes consumed.
/// Returns a `DecodeError` on truncation or a non-minimal encoding.
pub fn decode(buf: &mut impl Buf) -> PeerResult<u64> {
    if !buf.has_remaining() {
        return Err(PeerError::decode("truncated varint"));
    }
    let prefix = buf.get_u8();
    match prefix {
        0xFD => {
            if buf.remaining() < 2 {
                return Err(PeerError::decode("truncated varint (0xFD)"));
            }
            let v = buf.get_u16_le() as u64;
            if v < 0xFD {
                return Err(PeerError::decode("non-minimal varint encoding"));
            }
            Ok(v)
        }
        0xFE => {
            if buf.remaining() < 4 {
                return Err(PeerError::decode("truncated varint (0xFE)"));
            }
            let v = buf.get_u32_le() as u64;
            if v <= 0xFFFF {
                return Err(PeerError::decode("non-minimal varint encoding"));
            }
            Ok(v)
        }
        0xFF => {
            if buf.remaining() < 8 {
                return Err(PeerError::decode("truncated varint (0xFF)"));
            }
            let v = buf.get_u64_le();
            if v <= 0xFFFF_FFFF {
                return Err(PeerError::decode("non-minimal varint encoding"));
            }
            Ok(v)
        }
        v => Ok(v as u64),
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(0)]
    #[case(0xFC)]
    #[case(0xFD)]
    #[case(0xFFFF)]
    #[case(0x1_0000)]
    #[case(0xFFFF_FFFF)]
    #[case(0x1_0000_0000)]
    #[case(u64::MAX)]
    fn round_trips(#[case] value: u64) {
        let mut buf = BytesMut::new();
        encode(value, &mut buf);
        assert_eq!(buf.len(), encoded_len(value));
        let mut reader = &buf[..];
        assert_eq!(decode(&mut reader).unwrap(), value);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn rejects_non_minimal_encoding() {
        // 0xFD prefix followed by a value that fits in one byte.
        let bytes = [0xFD_u8, 0x05, 0x00];
        let mut reader = &bytes[..];
        assert!(decode(&mut reader).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = [0xFE_u8, 0x01, 0x02];
        let mut reader = &bytes[..];
        assert!(decode(&mut reader).is_err());
    }
}
