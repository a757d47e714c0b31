//! Peer discovery: periodic `getpeers` refresh and reconnect-on-disconnect
//! while below the minimum live-peer count (§4.I.2).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use brook_core::constants::{MIN_LIVE_PEERS, PEER_REFRESH_MS};

use crate::handshake::connect;
use crate::peer::{Inbound, PeerHandle};
use crate::peer_table::PeerTable;
use crate::protocol::{GetPeers, PeersResponse, TYPE_GETPEERS};

/// Issue `getpeers` to `peer` and remember whatever addresses it
/// advertises.
pub async fn query_and_remember(peer: &PeerHandle, peers: &PeerTable) {
    match peer
        .request(TYPE_GETPEERS, serde_json::to_value(GetPeers {}).unwrap())
        .await
    {
        Ok(value) => match serde_json::from_value::<PeersResponse>(value) {
            Ok(resp) => peers.remember_addresses(resp.peers),
            Err(err) => warn!(%err, "malformed getpeers response"),
        },
        Err(err) => debug!(%err, "getpeers request failed"),
    }
}

/// Spawn the background discovery loop: every [`PEER_REFRESH_MS`], ask
/// two random live peers for their peers, and whenever the live peer
/// count is below [`MIN_LIVE_PEERS`], attempt to connect a known
/// address until none remain.
pub fn spawn_discovery_loop(
    peers: Arc<PeerTable>,
    self_node_id: String,
    self_listen_address: Option<String>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(PEER_REFRESH_MS));
        loop {
            interval.tick().await;
            for peer in peers.random_live(2) {
                query_and_remember(&peer, &peers).await;
            }
            maintain_minimum_peers(&peers, &self_node_id, self_listen_address.as_deref(), &inbound_tx).await;
        }
    });
}

/// While live peers are below [`MIN_LIVE_PEERS`] and addresses remain,
/// attempt outbound connections. Called after discovery refresh and
/// also right after a peer disconnects.
pub async fn maintain_minimum_peers(
    peers: &Arc<PeerTable>,
    self_node_id: &str,
    self_listen_address: Option<&str>,
    inbound_tx: &mpsc::UnboundedSender<Inbound>,
) {
    while peers.live_count() < MIN_LIVE_PEERS {
        let Some(addr) = peers.pop_unconnected_address() else {
            break;
        };
        if peers.is_connected(&addr) {
            continue;
        }
        match connect(&addr, self_node_id, self_listen_address, inbound_tx.clone()).await {
            Ok(handle) => {
                peers.insert(handle.clone());
                query_and_remember(&handle, peers).await;
            }
            Err(err) => debug!(%err, addr, "reconnect attempt failed"),
        }
    }
}
