//! The peer session loop (§4.3, §5): wires a duplex byte stream to a
//! [`PeerSession`] via the [`Framer`], running the writer and reader halves
//! as two cooperative tasks that share only bounded channels.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::framer::Framer;
use crate::message::Message;
use crate::node::{RemoteHost, SessionConfig};
use crate::session::{ManagerRequest, PeerSession};

/// Channel capacity for the outbound-to-wire queue (§4.4 backpressure).
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// Spawns the session loop over `stream` and returns the sender end of its
/// outbound channel — the handle an embedder (manager) uses to push
/// `Message`s destined for the wire (§4.4, §6 session construction
/// interface). The session runs until the socket closes, a fatal error
/// occurs, or the manager drops both this sender and its `manager` receiver.
pub fn spawn_session<S>(
    stream: S,
    remote: RemoteHost,
    config: SessionConfig,
    manager: mpsc::Sender<ManagerRequest>,
) -> mpsc::Sender<Message>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let framer = Framer::new(remote.chain, config.max_payload_len);
    let framed = Framed::new(stream, framer);
    let (mut sink, mut source) = framed.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

    let writer_remote = remote;
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(err) = sink.send(msg).await {
                log::warn!("{}: write failed, closing session: {}", writer_remote.addr, err);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = PeerSession::new(remote, outbound_tx.clone(), manager, config.min_protocol_version);
    let reader_task = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(err) => {
                    log::warn!("{}: framing error, closing session: {}", remote.addr, err);
                    break;
                }
            };
            if let Err(err) = session.dispatch(msg).await {
                if err.is_known_protocol_error() {
                    log::info!("{}: protocol error, closing session: {}", remote.addr, err);
                } else {
                    log::warn!("{}: fatal session error, closing session: {}", remote.addr, err);
                }
                break;
            }
        }
        log::debug!("{}: reader task exiting", remote.addr);
    });

    // Closing either channel or the socket must terminate both tasks (§5):
    // whichever task finishes first, abort the other rather than leaving it
    // to linger on the shared, `BiLock`-backed split socket.
    tokio::spawn(async move {
        let mut writer_task = writer_task;
        let mut reader_task = reader_task;
        tokio::select! {
            _ = &mut writer_task => reader_task.abort(),
            _ = &mut reader_task => writer_task.abort(),
        }
    });

    outbound_tx
}
