//! Outbound connection and the `nodeinfo` handshake (§4.I.1).

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{client_async, MaybeTlsStream};

use crate::peer::{run_peer, Inbound, PeerHandle};
use crate::protocol::{NodeInfo, TYPE_NODEINFO};

use brook_core::constants::CONNECT_TIMEOUT_MS;
use brook_core::error::ProtocolError;

/// Connect outbound to `addr` (a `"host:port"` string), complete the
/// WebSocket opening handshake within [`CONNECT_TIMEOUT_MS`], and send
/// our `nodeinfo`. Returns the connected [`PeerHandle`] before the
/// remote side's `nodeinfo` has necessarily arrived; callers that must
/// enforce self-connect rejection inspect the first inbound `nodeinfo`
/// event via `inbound_tx`.
pub async fn connect(
    addr: &str,
    self_node_id: &str,
    self_listen_address: Option<&str>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) -> anyhow::Result<PeerHandle> {
    let url = format!("ws://{addr}");
    let tcp = tokio::time::timeout(
        Duration::from_millis(CONNECT_TIMEOUT_MS),
        TcpStream::connect(addr),
    )
    .await
    .map_err(|_| anyhow::anyhow!("connect to {addr} timed out"))??;

    let (ws, _response) = tokio::time::timeout(
        Duration::from_millis(CONNECT_TIMEOUT_MS),
        client_async(url, MaybeTlsStream::Plain(tcp)),
    )
    .await
    .map_err(|_| anyhow::anyhow!("websocket open to {addr} timed out"))??;

    let handle = run_peer(ws, addr.to_string(), inbound_tx).await;
    handle.send(
        TYPE_NODEINFO,
        serde_json::to_value(NodeInfo {
            node_id: self_node_id.to_string(),
            listen_address: self_listen_address.map(|s| s.to_string()),
        })?,
    );
    Ok(handle)
}

/// Process an inbound `nodeinfo` message per the handshake rules:
/// reject malformed or self-connecting peers by closing the socket,
/// otherwise record the remote `nodeId` and advertised address.
pub fn handle_nodeinfo(
    peer: &PeerHandle,
    data: &serde_json::Value,
    self_node_id: &str,
) -> Result<(), ProtocolError> {
    let info: NodeInfo = serde_json::from_value(data.clone())
        .map_err(|_| ProtocolError::MissingField("nodeId"))?;
    if info.node_id == self_node_id {
        peer.close();
        return Err(ProtocolError::SelfConnect);
    }
    peer.set_node_id(info.node_id);
    if let Some(addr) = info.listen_address.filter(|a| !a.is_empty()) {
        peer.set_listen_address(Some(addr));
    }
    Ok(())
}
