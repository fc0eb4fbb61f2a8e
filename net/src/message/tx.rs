use sha2::digest::FixedOutput;
use sha2::{Digest, Sha256};

/// A `tx` message. The core only needs the raw bytes (to forward) and a
/// content hash (to correlate against a merkle block's expected hash list,
/// §4.3) — full transaction parsing is wallet scope, out of this core (§1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tx {
    pub raw: Vec<u8>,
}

impl Tx {
    pub fn new(raw: Vec<u8>) -> Self {
        Tx { raw }
    }

    /// Double-SHA-256 of the raw transaction bytes, in the same internal byte
    /// order used by the hashes inside a `merkleblock` payload.
    pub fn hash(&self) -> [u8; 32] {
        dsha256(&self.raw)
    }
}

pub fn dsha256(input: &[u8]) -> [u8; 32] {
    let first = Sha256::default().chain_update(input).finalize_fixed();
    Sha256::default().chain_update(first).finalize_fixed().into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let tx = Tx::new(vec![1, 2, 3]);
        assert_eq!(tx.hash(), tx.hash());
        assert_ne!(tx.hash(), Tx::new(vec![1, 2, 4]).hash());
    }
}
