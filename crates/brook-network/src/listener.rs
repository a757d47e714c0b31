//! Inbound connection acceptance and the dispatch loop that routes
//! parsed envelopes from every peer to the sync engine.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, MaybeTlsStream};
use tracing::{info, warn};

use crate::discovery::maintain_minimum_peers;
use crate::handshake::handle_nodeinfo;
use crate::peer::{run_peer, Inbound};
use crate::peer_table::PeerTable;
use crate::protocol::{
    BlockInv, TxInv, TYPE_BLOCKINV, TYPE_GETBLOCK, TYPE_GETPEERS, TYPE_GETTX, TYPE_NODEINFO, TYPE_TXINV,
};
use crate::sync::SyncEngine;

/// Accept inbound TCP connections on `listen_addr`, upgrade each to a
/// WebSocket peer, and register it. Runs until the listener errors.
pub async fn accept_loop(
    listen_addr: &str,
    peers: Arc<PeerTable>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(listen_addr, "listening for peers");
    loop {
        let (stream, remote) = listener.accept().await?;
        let ws = match accept_async(MaybeTlsStream::Plain(stream)).await {
            Ok(ws) => ws,
            Err(err) => {
                warn!(%err, "websocket upgrade failed");
                continue;
            }
        };
        let handle = run_peer(ws, remote.to_string(), inbound_tx.clone()).await;
        peers.insert(handle);
    }
}

/// Drain `inbound_rx` forever, routing each message to the sync engine
/// or handling handshake/discovery bookkeeping directly.
pub async fn dispatch_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    engine: Arc<SyncEngine>,
    peers: Arc<PeerTable>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) {
    while let Some(event) = inbound_rx.recv().await {
        match event {
            Inbound::Disconnected { peer } => {
                peers.remove(peer.remote_addr());
                maintain_minimum_peers(
                    &peers,
                    &engine.node_id,
                    engine.listen_address.as_deref(),
                    &inbound_tx,
                )
                .await;
            }
            Inbound::Message { peer, envelope } => match envelope.kind.as_str() {
                TYPE_NODEINFO => {
                    if handle_nodeinfo(&peer, &envelope.data, &engine.node_id).is_ok() {
                        peers.insert(peer.clone());
                        engine.greet_new_peer(&peer);
                        crate::discovery::query_and_remember(&peer, &peers).await;
                    }
                }
                TYPE_BLOCKINV => {
                    if let Ok(inv) = serde_json::from_value::<BlockInv>(envelope.data) {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            if let Err(err) = engine.ingest_block_inv(inv, peer).await {
                                warn!(%err, "block ingestion failed");
                            }
                        });
                    }
                }
                TYPE_TXINV => {
                    if let Ok(inv) = serde_json::from_value::<TxInv>(envelope.data) {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            if let Err(err) = engine.ingest_tx_inv(inv, peer).await {
                                warn!(%err, "transaction ingestion failed");
                            }
                        });
                    }
                }
                TYPE_GETBLOCK | TYPE_GETTX | TYPE_GETPEERS => {
                    engine.respond_to_request(&peer, &envelope.kind, envelope.id, envelope.data);
                }
                other => warn!(kind = other, "unrecognized message type"),
            },
        }
    }
}
