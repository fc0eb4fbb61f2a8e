//! P2P Bitcoin network library: wire codec, framing, merkle reconstruction
//! and the SPV peer session (§1–§6).

pub mod codec;
pub mod connection;
pub mod error;
pub mod framer;
pub mod merkle;
pub mod message;
pub mod node;
pub mod session;
pub mod varint;

pub use connection::spawn_session;
pub use error::{PeerError, PeerResult};
pub use node::{Chain, NodeDesc, NodeService, NodeServiceSet, RemoteHost, SessionConfig};
pub use session::{ManagerRequest, PeerSession};
