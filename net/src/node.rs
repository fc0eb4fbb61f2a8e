use std::net::SocketAddr;
use std::ops::BitAnd;

use strum::{EnumIter, IntoEnumIterator};

use crate::error::PeerError;

/// This node's own identity, as advertised in its outbound `version` message.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub chain: Chain,
    pub protocol_version: i32,
    pub services: NodeServiceSet,
    pub sub_ver: String,
    pub start_height: i32,
}

/// Selects the network magic value a session expects its peer to speak (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum Chain {
    Mainnet,
    Testnet3,
    Regtest,
}

impl Chain {
    pub fn magic_value(&self) -> u32 {
        match self {
            Chain::Mainnet => 0xD9B4BEF9,
            Chain::Testnet3 => 0x0709110B,
            Chain::Regtest => 0xDAB5BFFA,
        }
    }
}

impl TryFrom<u32> for Chain {
    type Error = PeerError;

    fn try_from(magic_value: u32) -> Result<Self, Self::Error> {
        for c in Self::iter() {
            if c.magic_value() == magic_value {
                return Ok(c);
            }
        }
        Err(PeerError::framing(format!("no known chain has magic value 0x{:08X}", magic_value)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeServiceSet(pub Vec<NodeService>);

impl NodeServiceSet {
    pub fn as_bitmask(&self) -> u64 {
        let mut bitset = 0x0_u64;
        for bit in self.0.iter() {
            bitset |= bit.as_u64();
        }
        bitset
    }

    pub fn from_bitmask(mask: u64) -> Self {
        let mut services = vec![];

        for e in NodeService::iter() {
            if mask.bitand(e.as_u64()) != 0 {
                services.push(e);
            }
        }

        NodeServiceSet(services)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
#[repr(u64)]
pub enum NodeService {
    NodeNetwork = 0x1,
    NodeBloom = 0x4,
}

impl NodeService {
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

/// Immutable descriptor of the peer endpoint a session was constructed for (§3, §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RemoteHost {
    pub addr: SocketAddr,
    pub chain: Chain,
}

impl RemoteHost {
    pub fn new(addr: SocketAddr, chain: Chain) -> Self {
        RemoteHost { addr, chain }
    }
}

/// Layered session configuration (§3, §9): what an embedder supplies besides
/// the socket and the channels.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub local: NodeDesc,
    pub min_protocol_version: i32,
    pub max_payload_len: u32,
}

pub const MIN_PROTOCOL_VERSION: i32 = 60001;
/// Guards against hostile allocations (§5): 32 MiB.
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;

impl SessionConfig {
    pub fn new(local: NodeDesc) -> Self {
        SessionConfig {
            local,
            min_protocol_version: MIN_PROTOCOL_VERSION,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_set_round_trips_through_bitmask() {
        let set = NodeServiceSet(vec![NodeService::NodeNetwork, NodeService::NodeBloom]);
        let mask = set.as_bitmask();
        assert_eq!(mask, 0x5);
        let back = NodeServiceSet::from_bitmask(mask);
        assert_eq!(back.0.len(), 2);
    }

    #[test]
    fn chain_magic_round_trips() {
        for chain in Chain::iter() {
            assert_eq!(Chain::try_from(chain.magic_value()).unwrap(), chain);
        }
    }

    #[test]
    fn unknown_magic_is_rejected() {
        assert!(Chain::try_from(0u32).is_err());
    }
}
