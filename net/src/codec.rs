//! The wire codec (§4.1): pure, stateless conversion between [`Message`]
//! values and their canonical byte representation. The framer (§4.2) is the
//! only thing that owns a buffer; everything here is a pure function.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PeerError, PeerResult};
use crate::message::header::{Command, MessageHeader, HEADER_LEN};
use crate::message::merkle_block::MerkleBlockPayload;
use crate::message::reject::RejectMessage;
use crate::message::tx::{dsha256, Tx};
use crate::message::version::VersionMessage;
use crate::message::Message;
use crate::node::Chain;

/// Serializes a payload-only body for `msg` (used by the framer's `Encoder`).
pub fn encode_payload(msg: &Message) -> Vec<u8> {
    let mut out = BytesMut::new();
    match msg {
        Message::Version(v) => v.encode(&mut out),
        Message::VerAck => {}
        Message::Ping(nonce) | Message::Pong(nonce) => out.put_u64_le(*nonce),
        Message::Reject(r) => r.encode(&mut out),
        Message::MerkleBlock(mb) => mb.encode(&mut out),
        Message::Tx(tx) => out.put_slice(&tx.raw),
        Message::Other(_, payload) => out.put_slice(payload),
    }
    out.to_vec()
}

/// Full header + payload wire bytes for `msg` on `chain` (§4.1 `encode`).
pub fn encode(msg: &Message, chain: Chain) -> Vec<u8> {
    let payload = encode_payload(msg);
    let checksum = checksum_of(&payload);

    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    out.put_u32_le(chain.magic_value());
    out.put_slice(&msg.command().as_bytes());
    out.put_u32_le(payload.len() as u32);
    out.put_slice(&checksum);
    out.put_slice(&payload);
    out.to_vec()
}

pub fn checksum_of(payload: &[u8]) -> [u8; 4] {
    let digest = dsha256(payload);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest[..4]);
    checksum
}

/// Decodes the fixed 24-byte header. Fails if the magic does not match
/// `expected_magic`, the command is malformed, or the claimed payload length
/// exceeds `max_payload_len` (§4.1, §5 memory ceiling).
pub fn decode_header(bytes: &[u8], expected_magic: u32, max_payload_len: u32) -> PeerResult<MessageHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(PeerError::framing("header shorter than 24 bytes"));
    }
    let mut buf = bytes;

    let magic = buf.get_u32_le();
    if magic != expected_magic {
        return Err(PeerError::framing(format!(
            "magic 0x{:08X} does not match expected 0x{:08X}",
            magic, expected_magic
        )));
    }

    let mut command_bytes = [0u8; 12];
    buf.copy_to_slice(&mut command_bytes);
    let command = Command::parse(command_bytes)?;

    let length = buf.get_u32_le();
    if length > max_payload_len {
        return Err(PeerError::framing(format!(
            "payload length {} exceeds configured maximum {}",
            length, max_payload_len
        )));
    }

    let mut checksum = [0u8; 4];
    buf.copy_to_slice(&mut checksum);

    Ok(MessageHeader {
        magic,
        command,
        length,
        checksum,
    })
}

/// Decodes a payload given the command it was declared under and the
/// checksum the header claimed for it (§4.1 `decode_payload`).
pub fn decode_payload(command: &Command, payload: &[u8], expected_checksum: [u8; 4]) -> PeerResult<Message> {
    if checksum_of(payload) != expected_checksum {
        return Err(PeerError::framing("checksum mismatch"));
    }

    Ok(match command {
        Command::Version => Message::Version(VersionMessage::decode(payload)?),
        Command::VerAck => Message::VerAck,
        Command::Ping => Message::Ping(decode_nonce(payload)?),
        Command::Pong => Message::Pong(decode_nonce(payload)?),
        Command::Reject => Message::Reject(RejectMessage::decode(payload)?),
        Command::MerkleBlock => Message::MerkleBlock(MerkleBlockPayload::decode(payload)?),
        Command::Tx => Message::Tx(Tx::new(payload.to_vec())),
        Command::Other(bytes) => Message::Other(command_name(bytes), payload.to_vec()),
    })
}

fn decode_nonce(payload: &[u8]) -> PeerResult<u64> {
    if payload.len() < 8 {
        return Err(PeerError::decode("truncated ping/pong payload"));
    }
    let mut buf = payload;
    Ok(buf.get_u64_le())
}

fn command_name(bytes: &[u8; 12]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, SocketAddr};

    use rstest::*;

    use super::*;
    use crate::node::{NodeDesc, NodeService, NodeServiceSet};

    #[test]
    fn checksum_is_deterministic_and_payload_sensitive() {
        assert_eq!(checksum_of(b"hello world"), checksum_of(b"hello world"));
        assert_ne!(checksum_of(b"hello world"), checksum_of(b"hello world!"));
    }

    fn version_message() -> Message {
        let me = NodeDesc {
            chain: Chain::Regtest,
            protocol_version: 70015,
            services: NodeServiceSet(vec![NodeService::NodeNetwork]),
            sub_ver: "/codec-test:1.0/".to_string(),
            start_height: 7,
        };
        Message::Version(VersionMessage::new(
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 18444),
            &me,
        ))
    }

    #[rstest]
    #[case(Message::VerAck)]
    #[case(Message::Ping(0xDEAD_BEEF))]
    #[case(Message::Pong(0xDEAD_BEEF))]
    #[case(Message::Tx(Tx::new(vec![1, 2, 3, 4])))]
    #[case(Message::Reject(RejectMessage::new("version", crate::message::RejectCode::Duplicate, "dup")))]
    #[case(Message::Other("filterload".to_string(), vec![9, 9, 9]))]
    fn round_trip_preserves_message(#[case] msg: Message) {
        let wire = encode(&msg, Chain::Regtest);
        let header = decode_header(&wire[..HEADER_LEN], Chain::Regtest.magic_value(), u32::MAX).unwrap();
        let payload = &wire[HEADER_LEN..];
        assert_eq!(header.length as usize, payload.len());
        let decoded = decode_payload(&header.command, payload, header.checksum).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trip_version_message() {
        let msg = version_message();
        let wire = encode(&msg, Chain::Regtest);
        let header = decode_header(&wire[..HEADER_LEN], Chain::Regtest.magic_value(), u32::MAX).unwrap();
        let payload = &wire[HEADER_LEN..];
        let decoded = decode_payload(&header.command, payload, header.checksum).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_wrong_magic() {
        let wire = encode(&Message::VerAck, Chain::Regtest);
        assert!(decode_header(&wire[..HEADER_LEN], Chain::Testnet3.magic_value(), u32::MAX).is_err());
    }

    #[test]
    fn rejects_oversized_payload_claim() {
        let wire = encode(&Message::Tx(Tx::new(vec![0u8; 100])), Chain::Regtest);
        assert!(decode_header(&wire[..HEADER_LEN], Chain::Regtest.magic_value(), 10).is_err());
    }

    #[test]
    fn rejects_flipped_checksum_byte() {
        let mut wire = encode(&Message::Tx(Tx::new(vec![1, 2, 3])), Chain::Regtest);
        let header = decode_header(&wire[..HEADER_LEN], Chain::Regtest.magic_value(), u32::MAX).unwrap();
        // flip a payload byte without touching the header's checksum field.
        let payload_start = HEADER_LEN;
        wire[payload_start] ^= 0xFF;
        let payload = &wire[HEADER_LEN..];
        assert!(decode_payload(&header.command, payload, header.checksum).is_err());
    }
}
