use bytes::{Buf, BufMut, BytesMut};

use crate::error::PeerResult;
use crate::varint;

/// BIP-61 rejection codes. The core only ever emits `Duplicate` for the
/// duplicate-`version` handshake error (§4.3, §7); the rest round-trip for
/// rejections the core merely forwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RejectCode {
    Malformed,
    Invalid,
    Obsolete,
    Duplicate,
    NonStandard,
    Dust,
    InsufficientFee,
    Checkpoint,
    Other(u8),
}

impl RejectCode {
    fn as_u8(self) -> u8 {
        match self {
            RejectCode::Malformed => 0x01,
            RejectCode::Invalid => 0x10,
            RejectCode::Obsolete => 0x11,
            RejectCode::Duplicate => 0x12,
            RejectCode::NonStandard => 0x40,
            RejectCode::Dust => 0x41,
            RejectCode::InsufficientFee => 0x42,
            RejectCode::Checkpoint => 0x43,
            RejectCode::Other(code) => code,
        }
    }

    fn from_u8(code: u8) -> Self {
        match code {
            0x01 => RejectCode::Malformed,
            0x10 => RejectCode::Invalid,
            0x11 => RejectCode::Obsolete,
            0x12 => RejectCode::Duplicate,
            0x40 => RejectCode::NonStandard,
            0x41 => RejectCode::Dust,
            0x42 => RejectCode::InsufficientFee,
            0x43 => RejectCode::Checkpoint,
            other => RejectCode::Other(other),
        }
    }
}

/// `reject` payload (§3): the command it refers to, a reason code, a
/// human-readable reason, and an optional 32-byte extra-data hash (present
/// for block/tx rejections per BIP-61, absent otherwise).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectMessage {
    pub rejected_command: String,
    pub code: RejectCode,
    pub reason: String,
    pub data: Option<[u8; 32]>,
}

impl RejectMessage {
    pub fn new(rejected_command: impl Into<String>, code: RejectCode, reason: impl Into<String>) -> Self {
        RejectMessage {
            rejected_command: rejected_command.into(),
            code,
            reason: reason.into(),
            data: None,
        }
    }

    pub(crate) fn decode(payload: &[u8]) -> PeerResult<Self> {
        let mut buf = payload;
        let rejected_command = read_var_str(&mut buf)?;
        let code = RejectCode::from_u8(buf.get_u8());
        let reason = read_var_str(&mut buf)?;
        let data = if buf.remaining() >= 32 {
            let mut h = [0u8; 32];
            buf.copy_to_slice(&mut h);
            Some(h)
        } else {
            None
        };
        Ok(RejectMessage {
            rejected_command,
            code,
            reason,
            data,
        })
    }

    pub(crate) fn encode(&self, out: &mut BytesMut) {
        write_var_str(&self.rejected_command, out);
        out.put_u8(self.code.as_u8());
        write_var_str(&self.reason, out);
        if let Some(data) = self.data {
            out.put_slice(&data);
        }
    }
}

fn read_var_str(buf: &mut &[u8]) -> PeerResult<String> {
    let len = varint::decode(buf)? as usize;
    if buf.remaining() < len {
        return Err(crate::error::PeerError::decode("truncated var_str"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| crate::error::PeerError::decode("var_str is not valid UTF-8"))
}

fn write_var_str(s: &str, out: &mut BytesMut) {
    let bytes = s.as_bytes();
    varint::encode(bytes.len() as u64, out);
    out.put_slice(bytes);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_without_data() {
        let msg = RejectMessage::new("version", RejectCode::Duplicate, "Duplicate version message");
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let decoded = RejectMessage::decode(&buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_with_data() {
        let mut msg = RejectMessage::new("tx", RejectCode::Dust, "dust");
        msg.data = Some([7u8; 32]);
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let decoded = RejectMessage::decode(&buf).unwrap();
        assert_eq!(decoded, msg);
    }
}
