use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use net::message::{Message, VersionMessage};
use net::{Chain, ManagerRequest, NodeDesc, NodeService, NodeServiceSet, RemoteHost, SessionConfig};

/// Minimal stand-in for the out-of-scope peer manager: dials one peer,
/// performs the handshake, and logs every event the session produces.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Remote IP socket address. E.g. 127.0.0.1:18445 for a local regression testnet node
    #[arg(short, long)]
    remote: SocketAddr,

    /// Which network the remote is expected to speak
    #[arg(long, value_enum, default_value_t = NetworkArg::Regtest)]
    network: NetworkArg,

    /// How long to wait for the version/verack handshake to complete, in seconds
    #[arg(long, default_value_t = 5)]
    verack_timeout: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet3,
    Regtest,
}

impl From<NetworkArg> for Chain {
    fn from(value: NetworkArg) -> Self {
        match value {
            NetworkArg::Mainnet => Chain::Mainnet,
            NetworkArg::Testnet3 => Chain::Testnet3,
            NetworkArg::Regtest => Chain::Regtest,
        }
    }
}

fn init_logging() {
    SimpleLogger::new()
        .with_colors(true)
        .with_level(LevelFilter::Debug)
        .with_local_timestamps()
        .init()
        .unwrap();
}

const BITCOIN_PROTOCOL_VERSION: i32 = 70016; // matches bitcoin core v24

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let chain: Chain = args.network.into();

    let local = NodeDesc {
        chain,
        protocol_version: BITCOIN_PROTOCOL_VERSION,
        services: NodeServiceSet(vec![NodeService::NodeNetwork]),
        sub_ver: "/node-handshake:1.0/".to_string(),
        start_height: 0,
    };
    let config = SessionConfig::new(local.clone());
    let remote = RemoteHost::new(args.remote, chain);

    log::info!("dialing {} on {:?}", args.remote, chain);
    let socket = TcpStream::connect(args.remote).await?;

    let (manager_tx, mut manager_rx) = mpsc::channel(32);
    let outbound = net::spawn_session(socket, remote, config, manager_tx);

    let our_version = VersionMessage::new(args.remote, &local);
    outbound.send(Message::Version(our_version)).await?;

    let handshake_timeout = Duration::from_secs(args.verack_timeout);
    match timeout(handshake_timeout, drain_until_handshake(&mut manager_rx)).await {
        Ok(true) => log::info!("handshake with {} complete", args.remote),
        Ok(false) => log::warn!("session with {} closed before the handshake completed", args.remote),
        Err(_) => {
            log::warn!("handshake with {} timed out after {:?}", args.remote, handshake_timeout);
            return Ok(());
        }
    }

    drain_forever(&mut manager_rx).await;
    Ok(())
}

/// Logs manager events until a `Handshake` arrives or the channel closes.
/// Returns whether the handshake was observed.
async fn drain_until_handshake(rx: &mut mpsc::Receiver<ManagerRequest>) -> bool {
    while let Some(event) = rx.recv().await {
        let is_handshake = matches!(event, ManagerRequest::Handshake(..));
        log_event(&event);
        if is_handshake {
            return true;
        }
    }
    false
}

async fn drain_forever(rx: &mut mpsc::Receiver<ManagerRequest>) {
    while let Some(event) = rx.recv().await {
        log_event(&event);
    }
    log::debug!("manager channel closed, exiting");
}

fn log_event(event: &ManagerRequest) {
    match event {
        ManagerRequest::Handshake(remote, v) => {
            log::info!(
                "{}: handshake complete, protocol_version={} user_agent={:?}",
                remote.addr,
                v.protocol_version,
                v.user_agent
            );
        }
        ManagerRequest::MerkleBlockReady(remote, mb) => {
            log::debug!("{}: merkle block ready, {} matched tx(s)", remote.addr, mb.merkle_txs.len());
        }
        ManagerRequest::PassThrough(remote, msg) => {
            log::debug!("{}: pass-through message: {:?}", remote.addr, msg);
        }
    }
}
