//! Peer session state and dispatch (§4.3). `PeerSession` owns the handshake
//! status and any in-progress merkle-block reassembly for one connection;
//! `dispatch` is the state machine that turns one inbound `Message` into
//! outbound wire traffic and/or manager events.

use std::collections::HashMap;

use tokio::sync::mpsc::Sender;

use crate::error::{PeerError, PeerResult};
use crate::message::merkle_block::{DecodedMerkleBlock, MerkleBlockPayload};
use crate::message::reject::{RejectCode, RejectMessage};
use crate::message::{Message, Tx, VersionMessage};
use crate::merkle;
use crate::node::RemoteHost;

/// Outbound events a session reports to its manager (§3, §4.4).
#[derive(Clone, Debug, PartialEq)]
pub enum ManagerRequest {
    Handshake(RemoteHost, VersionMessage),
    MerkleBlockReady(RemoteHost, DecodedMerkleBlock),
    PassThrough(RemoteHost, Message),
}

/// Per-connection mutable record (§3). Owned exclusively by the inbound task
/// that drives it; never shared.
pub struct PeerSession {
    remote: RemoteHost,
    outbound: Sender<Message>,
    manager: Sender<ManagerRequest>,
    min_protocol_version: i32,
    peer_version: Option<VersionMessage>,
    inflight_merkle: Option<DecodedMerkleBlock>,
}

impl PeerSession {
    pub fn new(
        remote: RemoteHost,
        outbound: Sender<Message>,
        manager: Sender<ManagerRequest>,
        min_protocol_version: i32,
    ) -> Self {
        PeerSession {
            remote,
            outbound,
            manager,
            min_protocol_version,
            peer_version: None,
            inflight_merkle: None,
        }
    }

    pub fn peer_version(&self) -> Option<&VersionMessage> {
        self.peer_version.as_ref()
    }

    /// Dispatches one inbound message through the state machine (§4.3).
    /// Returns an error when the connection must be torn down; the caller
    /// (the session loop, §4.3) is responsible for closing it.
    pub async fn dispatch(&mut self, msg: Message) -> PeerResult<()> {
        if !matches!(msg, Message::Tx(_)) {
            self.flush_merkle().await?;
        }

        match msg {
            Message::Version(v) => self.handle_version(v).await,
            Message::VerAck => {
                log::debug!("{}: verack", self.remote.addr);
                Ok(())
            }
            Message::Ping(nonce) => {
                self.outbound.send(Message::Pong(nonce)).await?;
                Ok(())
            }
            Message::MerkleBlock(mb) => self.handle_merkle_block(mb).await,
            Message::Tx(tx) => self.handle_tx(tx).await,
            other => self.forward_pass_through(other).await,
        }
    }

    async fn handle_version(&mut self, v: VersionMessage) -> PeerResult<()> {
        if self.peer_version.is_some() {
            let reject = RejectMessage::new("version", RejectCode::Duplicate, "Duplicate version message");
            self.outbound.send(Message::Reject(reject)).await?;
            return Err(PeerError::protocol("duplicate version message"));
        }

        if v.protocol_version < self.min_protocol_version {
            return Err(PeerError::protocol(format!(
                "peer protocol version {} below minimum {}",
                v.protocol_version, self.min_protocol_version
            )));
        }

        log::info!("{}: handshake at protocol version {}", self.remote.addr, v.protocol_version);
        self.peer_version = Some(v.clone());
        self.outbound.send(Message::VerAck).await?;
        self.manager.send(ManagerRequest::Handshake(self.remote, v)).await?;
        Ok(())
    }

    async fn handle_merkle_block(&mut self, mb: MerkleBlockPayload) -> PeerResult<()> {
        let extracted = merkle::extract_matches(&mb.flags, &mb.hashes, mb.total_transactions)?;

        let decoded = DecodedMerkleBlock {
            header: mb.header,
            merkle_root: extracted.root,
            expected_txs: extracted.matched,
            merkle_txs: Vec::new(),
        };

        if decoded.expected_txs.is_empty() {
            self.manager.send(ManagerRequest::MerkleBlockReady(self.remote, decoded)).await?;
        } else {
            self.inflight_merkle = Some(decoded);
        }
        Ok(())
    }

    async fn handle_tx(&mut self, tx: Tx) -> PeerResult<()> {
        if let Some(inflight) = self.inflight_merkle.as_mut() {
            let hash = tx.hash();
            if inflight.expected_txs.contains(&hash) {
                inflight.merkle_txs.push(tx);
                return Ok(());
            }
            self.flush_merkle().await?;
            return self.forward_pass_through(Message::Tx(tx)).await;
        }
        self.forward_pass_through(Message::Tx(tx)).await
    }

    /// Flushes `inflight_merkle`, if any: reorders accumulated transactions
    /// to match `expected_txs`, dropping hashes with no matching tx (I3).
    async fn flush_merkle(&mut self) -> PeerResult<()> {
        let Some(mut inflight) = self.inflight_merkle.take() else {
            return Ok(());
        };

        let by_hash: HashMap<[u8; 32], Tx> = inflight.merkle_txs.drain(..).map(|tx| (tx.hash(), tx)).collect();
        inflight.merkle_txs = inflight
            .expected_txs
            .iter()
            .filter_map(|h| by_hash.get(h).cloned())
            .collect();

        self.manager.send(ManagerRequest::MerkleBlockReady(self.remote, inflight)).await?;
        Ok(())
    }

    async fn forward_pass_through(&mut self, msg: Message) -> PeerResult<()> {
        self.manager.send(ManagerRequest::PassThrough(self.remote, msg)).await?;
        Ok(())
    }
}
