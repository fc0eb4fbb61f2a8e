use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PeerError, PeerResult};
use crate::message::tx::Tx;
use crate::varint;

pub const BLOCK_HEADER_LEN: usize = 80;

/// The 80-byte block header carried at the front of a `merkleblock` payload (§3).
/// Proof-of-work and chain-validity checks on it are out of scope (§1 Non-goals).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub(crate) fn decode(buf: &mut &[u8]) -> PeerResult<Self> {
        if buf.remaining() < BLOCK_HEADER_LEN {
            return Err(PeerError::decode("truncated block header"));
        }
        let version = buf.get_i32_le();
        let mut prev_block = [0u8; 32];
        buf.copy_to_slice(&mut prev_block);
        let mut merkle_root = [0u8; 32];
        buf.copy_to_slice(&mut merkle_root);
        let timestamp = buf.get_u32_le();
        let bits = buf.get_u32_le();
        let nonce = buf.get_u32_le();
        Ok(BlockHeader {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
        })
    }

    pub(crate) fn encode(&self, out: &mut BytesMut) {
        out.put_i32_le(self.version);
        out.put_slice(&self.prev_block);
        out.put_slice(&self.merkle_root);
        out.put_u32_le(self.timestamp);
        out.put_u32_le(self.bits);
        out.put_u32_le(self.nonce);
    }
}

/// The raw wire shape of a `merkleblock` payload: a block header, the total
/// transaction count of the full block, the partial-tree hash list, and the
/// flag bit-vector (§3, §4.3). Reconstructing the root and the matched leaf
/// hashes from `hashes`/`flags` is `extract_matches` (§4.3), not this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleBlockPayload {
    pub header: BlockHeader,
    pub total_transactions: u32,
    pub hashes: Vec<[u8; 32]>,
    pub flags: Vec<u8>,
}

impl MerkleBlockPayload {
    pub(crate) fn decode(payload: &[u8]) -> PeerResult<Self> {
        let mut buf = payload;
        let header = BlockHeader::decode(&mut buf)?;

        if buf.remaining() < 4 {
            return Err(PeerError::decode("truncated merkleblock payload"));
        }
        let total_transactions = buf.get_u32_le();

        let hash_count = varint::decode(&mut buf)? as usize;
        if buf.remaining() / 32 < hash_count {
            return Err(PeerError::decode("truncated merkleblock hash list"));
        }
        let mut hashes = Vec::with_capacity(hash_count);
        for _ in 0..hash_count {
            let mut h = [0u8; 32];
            buf.copy_to_slice(&mut h);
            hashes.push(h);
        }

        let flag_byte_count = varint::decode(&mut buf)? as usize;
        if buf.remaining() < flag_byte_count {
            return Err(PeerError::decode("truncated merkleblock flags"));
        }
        let mut flags = vec![0u8; flag_byte_count];
        buf.copy_to_slice(&mut flags);

        Ok(MerkleBlockPayload {
            header,
            total_transactions,
            hashes,
            flags,
        })
    }

    pub(crate) fn encode(&self, out: &mut BytesMut) {
        self.header.encode(out);
        out.put_u32_le(self.total_transactions);
        varint::encode(self.hashes.len() as u64, out);
        for h in &self.hashes {
            out.put_slice(h);
        }
        varint::encode(self.flags.len() as u64, out);
        out.put_slice(&self.flags);
    }
}

/// The reassembled bundle a session hands to the manager once a merkle block
/// flushes (§3, §4.3 rule 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedMerkleBlock {
    pub header: BlockHeader,
    pub merkle_root: [u8; 32],
    pub expected_txs: Vec<[u8; 32]>,
    pub merkle_txs: Vec<Tx>,
}
