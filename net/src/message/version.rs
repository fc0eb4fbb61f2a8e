use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};
use rand::{thread_rng, Rng};

use crate::error::{PeerError, PeerResult};
use crate::node::{NodeDesc, NodeServiceSet};
use crate::varint;

/// https://en.bitcoin.it/wiki/Protocol_documentation#version
///
/// size | field        | type     | description
/// ---  | -----        | ----     | ------------
/// 4    | version      | i32      | protocol version used by the node
/// 8    | services     | u64      | bitfield of features enabled for this connection
/// 8    | timestamp    | i64      | standard UNIX timestamp in seconds
/// 26   | addr_recv    | net_addr | the network address of the node receiving this message
/// 26   | addr_from    | net_addr | field can be ignored
/// 8    | nonce        | u64      | node random nonce
/// ?    | user_agent   | var_str  | user agent (0x00 if string is 0 bytes long)
/// 4    | start_height | i32      | the last block received by the emitting node
/// 1    | relay        | bool     | whether the remote peer should announce relayed transactions
#[derive(Clone, Debug, PartialEq)]
pub struct VersionMessage {
    pub protocol_version: i32,
    pub services: NodeServiceSet,
    pub timestamp: i64,
    pub addr_recv: SocketAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

impl VersionMessage {
    pub fn new(addr_recv: SocketAddr, me: &NodeDesc) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_secs() as i64;

        VersionMessage {
            protocol_version: me.protocol_version,
            services: me.services.clone(),
            timestamp,
            addr_recv,
            nonce: thread_rng().gen(),
            user_agent: me.sub_ver.clone(),
            start_height: me.start_height,
            relay: true,
        }
    }

    pub(crate) fn decode(payload: &[u8]) -> PeerResult<Self> {
        let mut buf = payload;

        if buf.remaining() < 4 {
            return Err(PeerError::decode("truncated version payload"));
        }
        let protocol_version = buf.get_i32_le();
        if buf.remaining() < 8 {
            return Err(PeerError::decode("truncated version payload"));
        }
        let services = NodeServiceSet::from_bitmask(buf.get_u64_le());
        if buf.remaining() < 8 {
            return Err(PeerError::decode("truncated version payload"));
        }
        let timestamp = buf.get_i64_le();
        let (_, addr_recv) = parse_net_addr(&mut buf)?;
        let (_, _addr_from) = parse_net_addr(&mut buf)?;
        if buf.remaining() < 8 {
            return Err(PeerError::decode("truncated version payload"));
        }
        let nonce = buf.get_u64_le();
        let user_agent = parse_var_str(&mut buf)?;
        if buf.remaining() < 4 {
            return Err(PeerError::decode("truncated version payload"));
        }
        let start_height = buf.get_i32_le();
        let relay = if buf.has_remaining() { buf.get_u8() != 0 } else { true };

        Ok(VersionMessage {
            protocol_version,
            services,
            timestamp,
            addr_recv,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }

    pub(crate) fn encode(&self, out: &mut BytesMut) {
        out.put_i32_le(self.protocol_version);
        out.put_u64_le(self.services.as_bitmask());
        out.put_i64_le(self.timestamp);
        compose_net_addr(&self.services, &self.addr_recv, out);
        // addr_from: field can be ignored, but its 26 bytes are still present on the wire.
        compose_net_addr(&NodeServiceSet(vec![]), &SocketAddr::new(self.addr_recv.ip(), 0), out);
        out.put_u64_le(self.nonce);
        compose_var_str(&self.user_agent, out);
        out.put_i32_le(self.start_height);
        out.put_u8(if self.relay { 1 } else { 0 });
    }
}

/// Address record without the `time` field carried inside a `version` message (§3 NetAddr).
fn parse_net_addr(buf: &mut &[u8]) -> PeerResult<(NodeServiceSet, SocketAddr)> {
    if buf.remaining() < 26 {
        return Err(PeerError::decode("truncated net_addr"));
    }
    let services = NodeServiceSet::from_bitmask(buf.get_u64_le());
    let mut octets = [0u8; 16];
    buf.copy_to_slice(&mut octets);
    let ip = IpAddr::from(octets);
    let port = buf.get_u16();
    Ok((services, SocketAddr::new(ip, port)))
}

fn compose_net_addr(services: &NodeServiceSet, addr: &SocketAddr, out: &mut BytesMut) {
    out.put_u64_le(services.as_bitmask());
    let octets = match addr.ip() {
        IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
        IpAddr::V6(ip) => ip.octets(),
    };
    out.put_slice(&octets);
    out.put_u16(addr.port());
}

fn parse_var_str(buf: &mut &[u8]) -> PeerResult<String> {
    let len = varint::decode(buf)? as usize;
    if buf.remaining() < len {
        return Err(PeerError::decode("truncated var_str"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| PeerError::decode("var_str is not valid UTF-8"))
}

fn compose_var_str(s: &str, out: &mut BytesMut) {
    let bytes = s.as_bytes();
    varint::encode(bytes.len() as u64, out);
    out.put_slice(bytes);
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, SocketAddr};

    use bytes::BytesMut;

    use super::*;
    use crate::node::{Chain, NodeDesc, NodeService, NodeServiceSet};

    fn sample() -> VersionMessage {
        let me = NodeDesc {
            chain: Chain::Regtest,
            protocol_version: 70015,
            services: NodeServiceSet(vec![NodeService::NodeNetwork]),
            sub_ver: "/test:1.0/".to_string(),
            start_height: 42,
        };
        VersionMessage::new(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 18444), &me)
    }

    #[test]
    fn round_trips_through_wire_bytes() {
        let msg = sample();
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let decoded = VersionMessage::decode(&buf).unwrap();

        assert_eq!(decoded.protocol_version, msg.protocol_version);
        assert_eq!(decoded.services, msg.services);
        assert_eq!(decoded.timestamp, msg.timestamp);
        assert_eq!(decoded.nonce, msg.nonce);
        assert_eq!(decoded.user_agent, msg.user_agent);
        assert_eq!(decoded.start_height, msg.start_height);
        assert_eq!(decoded.relay, msg.relay);
    }
}
