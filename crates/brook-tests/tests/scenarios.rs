//! Concrete end-to-end scenarios (§8), driven over real loopback
//! WebSocket connections between in-process nodes.

use std::sync::Arc;
use std::time::Duration;

use brook_core::types::PublicKeyBytes;
use brook_node::{Node, NodeConfig};

async fn spawn_node(bind: &str, advertise: &str) -> Arc<Node> {
    let config = NodeConfig {
        bind_address: bind.to_string(),
        listen_address: Some(advertise.to_string()),
        ..NodeConfig::default()
    };
    let node = Node::start(config).await.unwrap();
    // give the listener task a moment to bind before anyone dials it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    node
}

async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn one_block_sync() {
    let a = spawn_node("127.0.0.1:17601", "127.0.0.1:17601").await;
    let b = spawn_node("127.0.0.1:17602", "127.0.0.1:17602").await;

    let mined_hash = a.mine(b"test block 1").await.unwrap();
    b.peer_add("127.0.0.1:17601").await.unwrap();

    let synced = wait_until(|| b.tip_summary().0 == mined_hash, Duration::from_millis(300)).await;
    assert!(synced, "B did not converge to A's tip in time");
    assert_eq!(a.tip_summary().1, 1);
    assert_eq!(b.tip_summary().1, 1);

    let block = b.block_by_hash(&mined_hash).unwrap();
    let sig = &block.txs[0].inputs[0].signature.0;
    let text_len = sig.iter().position(|&b| b == 0).unwrap_or(sig.len());
    assert_eq!(&sig[..text_len], b"test block 1");
}

#[tokio::test]
async fn fork_preference_by_cumulative_work() {
    let a = spawn_node("127.0.0.1:17611", "127.0.0.1:17611").await;
    let b = spawn_node("127.0.0.1:17612", "127.0.0.1:17612").await;

    a.mine(b"a1").await.unwrap();
    a.mine(b"a2").await.unwrap();
    b.mine(b"b1").await.unwrap();
    b.mine(b"b2").await.unwrap();
    let b_tip = b.mine(b"b3").await.unwrap();

    a.peer_add("127.0.0.1:17612").await.unwrap();

    let converged = wait_until(|| a.tip_summary().0 == b_tip, Duration::from_millis(500)).await;
    assert!(converged, "A did not adopt B's longer branch");
    assert_eq!(a.tip_summary().1, 3);
    assert_eq!(b.tip_summary().1, 3);
}

#[tokio::test]
async fn bidirectional_propagation() {
    let a = spawn_node("127.0.0.1:17621", "127.0.0.1:17621").await;
    let b = spawn_node("127.0.0.1:17622", "127.0.0.1:17622").await;
    a.peer_add("127.0.0.1:17622").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let x = a.mine(b"x").await.unwrap();
    assert!(wait_until(|| b.tip_summary().0 == x, Duration::from_millis(300)).await);

    let y = b.mine(b"y").await.unwrap();
    assert!(wait_until(|| a.tip_summary().0 == y, Duration::from_millis(300)).await);

    assert_eq!(a.tip_summary().1, 2);
    assert_eq!(b.tip_summary().1, 2);
}

#[tokio::test]
async fn mempool_syncs_on_connect() {
    let a = spawn_node("127.0.0.1:17631", "127.0.0.1:17631").await;
    let b = spawn_node("127.0.0.1:17632", "127.0.0.1:17632").await;

    let secret = [0x42u8; 32];
    let sender = a.wallet.lock().import_private_key(&secret).unwrap();
    a.mine(b"fund sender").await.unwrap();
    assert!(a.balance(&sender) >= 100_000_000);

    let receiver = PublicKeyBytes([0x77; brook_core::constants::PUBLIC_KEY_BYTES]);
    let txid = a.send(receiver, 100_000_000).await.unwrap();

    b.peer_add("127.0.0.1:17631").await.unwrap();
    let seen = wait_until(|| b.transaction_hex(&txid).is_some(), Duration::from_millis(500)).await;
    assert!(seen, "B's mempool never picked up A's broadcast transaction");
}

#[tokio::test]
async fn self_connect_is_rejected() {
    let a = spawn_node("127.0.0.1:17641", "127.0.0.1:17641").await;
    let before = a.peer_list().len();
    let result = a.peer_add("127.0.0.1:17641").await;
    assert!(result.is_err() || wait_until(|| a.peer_list().len() == before, Duration::from_millis(200)).await);
}
