//! A single peer connection: the WebSocket I/O task, outbound command
//! queue, and request/response correlation (§4.I).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use brook_core::constants::REQUEST_TIMEOUT_MS;

use crate::protocol::Envelope;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An event surfaced from a peer's I/O task: either a parsed envelope
/// or notice that the connection has closed.
pub enum Inbound {
    Message { peer: PeerHandle, envelope: Envelope },
    Disconnected { peer: PeerHandle },
}

/// A lightweight, cloneable handle to a connected peer. Sending never
/// blocks on network I/O: it enqueues onto the peer's outbound channel.
#[derive(Clone)]
pub struct PeerHandle {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: DashMap<u64, oneshot::Sender<Value>>,
    next_id: AtomicU64,
    node_id: RwLock<Option<String>>,
    listen_address: RwLock<Option<String>>,
    remote_addr: String,
}

impl PeerHandle {
    /// Build a handle around a detached outbound channel, for tests
    /// that exercise peer-table bookkeeping without real socket I/O.
    #[doc(hidden)]
    pub fn for_test(remote_addr: String, outbound: mpsc::UnboundedSender<WsMessage>) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                outbound,
                pending: DashMap::new(),
                next_id: AtomicU64::new(1),
                node_id: RwLock::new(None),
                listen_address: RwLock::new(None),
                remote_addr,
            }),
        }
    }

    pub fn remote_addr(&self) -> &str {
        &self.inner.remote_addr
    }

    pub fn node_id(&self) -> Option<String> {
        self.inner.node_id.read().clone()
    }

    pub fn set_node_id(&self, id: String) {
        *self.inner.node_id.write() = Some(id);
    }

    pub fn listen_address(&self) -> Option<String> {
        self.inner.listen_address.read().clone()
    }

    pub fn set_listen_address(&self, addr: Option<String>) {
        *self.inner.listen_address.write() = addr;
    }

    pub fn send(&self, kind: &str, data: Value) {
        let env = Envelope::notify(kind, data);
        let _ = self.inner.outbound.send(WsMessage::Text(env.to_text()));
    }

    pub fn respond(&self, id: Option<u64>, data: Value) {
        if let Some(id) = id {
            let env = Envelope::response(id, data);
            let _ = self.inner.outbound.send(WsMessage::Text(env.to_text()));
        }
    }

    /// Send a request and await the correlated response, or time out
    /// after [`REQUEST_TIMEOUT_MS`].
    pub async fn request(&self, kind: &str, data: Value) -> anyhow::Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);
        let env = Envelope::request(kind, id, data);
        self.inner
            .outbound
            .send(WsMessage::Text(env.to_text()))
            .map_err(|_| anyhow::anyhow!("peer outbound channel closed"))?;
        match tokio::time::timeout(Duration::from_millis(REQUEST_TIMEOUT_MS), rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(anyhow::anyhow!("peer closed before responding")),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(brook_core::error::TimeoutError::RequestTimeout {
                    millis: REQUEST_TIMEOUT_MS,
                }
                .into())
            }
        }
    }

    pub fn close(&self) {
        let _ = self.inner.outbound.send(WsMessage::Close(None));
    }
}

/// Drive a single peer's WebSocket connection: forward parsed
/// envelopes to `inbound_tx`, resolve correlated responses locally, and
/// relay outbound sends from `PeerHandle`. Returns when the socket
/// closes or errors.
pub async fn run_peer(
    socket: WsStream,
    remote_addr: String,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) -> PeerHandle {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let handle = PeerHandle {
        inner: Arc::new(PeerInner {
            outbound: outbound_tx,
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            node_id: RwLock::new(None),
            listen_address: RwLock::new(None),
            remote_addr,
        }),
    };

    let spawned = handle.clone();
    tokio::spawn(async move {
        let (mut sink, mut stream) = socket.split();
        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(WsMessage::Close(_)) => {
                            let _ = sink.send(WsMessage::Close(None)).await;
                            break;
                        }
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            match Envelope::from_text(&text) {
                                Ok(env) => dispatch(&spawned, env, &inbound_tx),
                                Err(err) => warn!(%err, "malformed envelope from peer"),
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            debug!(%err, "peer socket error");
                            break;
                        }
                    }
                }
            }
        }
        let _ = inbound_tx.send(Inbound::Disconnected { peer: spawned.clone() });
    });

    handle
}

fn dispatch(peer: &PeerHandle, env: Envelope, inbound_tx: &mpsc::UnboundedSender<Inbound>) {
    if env.kind == crate::protocol::TYPE_RESPONSE {
        if let Some(id) = env.id {
            if let Some((_, tx)) = peer.inner.pending.remove(&id) {
                let _ = tx.send(env.data);
            }
        }
        return;
    }
    let _ = inbound_tx.send(Inbound::Message {
        peer: peer.clone(),
        envelope: env,
    });
}
