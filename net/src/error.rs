use std::io;

pub type PeerResult<T> = Result<T, PeerError>;

/// The error taxonomy of §7: every fatal path keeps its `#[source]` chain back
/// to the underlying I/O or parse failure instead of collapsing into a string.
#[derive(thiserror::Error, Debug)]
pub enum PeerError {
    #[error("framing error: {0}")]
    Framing(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("merkle error: {0}")]
    Merkle(String),

    #[error("io error")]
    Io(#[from] io::Error),

    #[error("channel closed")]
    ChannelClosed,
}

impl PeerError {
    pub fn framing(msg: impl Into<String>) -> Self {
        PeerError::Framing(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        PeerError::Decode(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        PeerError::Protocol(msg.into())
    }

    pub fn merkle(msg: impl Into<String>) -> Self {
        PeerError::Merkle(msg.into())
    }

    /// Whether §7 asks us to surface this to the remote via a `Reject` message
    /// before disconnecting.
    pub fn is_known_protocol_error(&self) -> bool {
        matches!(self, PeerError::Protocol(_))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PeerError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PeerError::ChannelClosed
    }
}
