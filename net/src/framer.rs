//! The framer (§4.2): turns a byte stream into a `Message` stream and back,
//! via `tokio_util`'s `Decoder`/`Encoder` traits. `Framed::split()` gives the
//! session its independent read/write halves (§4.3, §5).

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec;
use crate::error::PeerError;
use crate::message::header::{MessageHeader, HEADER_LEN};
use crate::message::Message;
use crate::node::Chain;

/// Stateful wrapper around the stateless `codec` functions. Holds the parsed
/// header between `decode` calls while it waits for the rest of the payload
/// to arrive (§4.2 `feed`/`next`).
pub struct Framer {
    chain: Chain,
    max_payload_len: u32,
    header: Option<MessageHeader>,
}

impl Framer {
    pub fn new(chain: Chain, max_payload_len: u32) -> Self {
        Framer {
            chain,
            max_payload_len,
            header: None,
        }
    }
}

impl Decoder for Framer {
    type Item = Message;
    type Error = PeerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, PeerError> {
        if self.header.is_none() {
            if src.len() < HEADER_LEN {
                src.reserve(HEADER_LEN - src.len());
                return Ok(None);
            }
            let header_bytes = src.split_to(HEADER_LEN);
            let header = codec::decode_header(&header_bytes, self.chain.magic_value(), self.max_payload_len)?;
            self.header = Some(header);
        }

        let needed = self.header.as_ref().expect("header set above").length as usize;
        if src.len() < needed {
            src.reserve(needed - src.len());
            return Ok(None);
        }

        let payload = src.split_to(needed);
        let header = self.header.take().expect("header set above");
        let message = codec::decode_payload(&header.command, &payload, header.checksum)?;
        Ok(Some(message))
    }
}

impl Encoder<Message> for Framer {
    type Error = PeerError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), PeerError> {
        let wire = codec::encode(&item, self.chain);
        dst.reserve(wire.len());
        dst.extend_from_slice(&wire);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use bytes::Buf;
    use rstest::*;

    use super::*;
    use crate::message::reject::RejectCode;
    use crate::message::{RejectMessage, Tx};

    fn roundtrip(messages: Vec<Message>, chunk_size: usize) -> Vec<Message> {
        let mut encoder = Framer::new(Chain::Regtest, u32::MAX);
        let mut wire = BytesMut::new();
        for m in &messages {
            encoder.encode(m.clone(), &mut wire).unwrap();
        }

        let mut decoder = Framer::new(Chain::Regtest, u32::MAX);
        let mut feed = BytesMut::new();
        let mut decoded = Vec::new();
        while wire.has_remaining() {
            let take = chunk_size.min(wire.len());
            feed.extend_from_slice(&wire.split_to(take));
            while let Some(msg) = decoder.decode(&mut feed).unwrap() {
                decoded.push(msg);
            }
        }
        decoded
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    #[case(4096)]
    fn frames_survive_arbitrary_chunking(#[case] chunk_size: usize) {
        let messages = vec![
            Message::VerAck,
            Message::Ping(42),
            Message::Tx(Tx::new(vec![1, 2, 3, 4, 5])),
            Message::Reject(RejectMessage::new("tx", RejectCode::Dust, "dust")),
        ];
        let decoded = roundtrip(messages.clone(), chunk_size);
        assert_eq!(decoded, messages);
    }

    #[test]
    fn decode_returns_none_on_incomplete_header() {
        let mut decoder = Framer::new(Chain::Regtest, u32::MAX);
        let mut buf = BytesMut::from(&b"\x00\x00\x00"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_returns_none_on_incomplete_payload() {
        let mut encoder = Framer::new(Chain::Regtest, u32::MAX);
        let mut wire = BytesMut::new();
        encoder.encode(Message::Tx(Tx::new(vec![1, 2, 3, 4])), &mut wire).unwrap();
        wire.truncate(wire.len() - 1);

        let mut decoder = Framer::new(Chain::Regtest, u32::MAX);
        assert_eq!(decoder.decode(&mut wire).unwrap(), None);
    }

    #[test]
    fn decode_rejects_wrong_chain_magic() {
        let mut encoder = Framer::new(Chain::Mainnet, u32::MAX);
        let mut wire = BytesMut::new();
        encoder.encode(Message::VerAck, &mut wire).unwrap();

        let mut decoder = Framer::new(Chain::Testnet3, u32::MAX);
        assert!(decoder.decode(&mut wire).is_err());
    }
}
