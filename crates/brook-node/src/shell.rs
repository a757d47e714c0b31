//! The interactive line-oriented shell (§6): one command per line on
//! stdin, results printed to stdout, `q` exits with status 0.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use brook_core::types::PublicKeyBytes;

use crate::node::Node;

/// Run the interactive command loop until `q` or EOF.
pub async fn run(node: Arc<Node>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("brook node ready ({})", node.node_id());
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        match cmd {
            "q" => break,
            "mine" => handle_mine(&node, &rest).await,
            "mineloop" => handle_mineloop(&node, &rest),
            "stoploop" => {
                node.stop_mine_loop();
                println!("stopped");
            }
            "send" => handle_send(&node, &rest).await,
            "account" => handle_account(&node),
            "balance" => handle_balance(&node, &rest),
            "peer" => handle_peer(&node, &rest).await,
            "block" => handle_block(&node, &rest),
            "blocktxs" => handle_blocktxs(&node, &rest),
            "tx" => handle_tx(&node, &rest),
            "unspent" => handle_unspent(&node, &rest),
            "importprivatekey" => handle_import(&node, &rest),
            other => println!("unrecognized command: {other}"),
        }
    }
    Ok(())
}

async fn handle_mine(node: &Arc<Node>, rest: &[&str]) {
    let message = rest.join(" ");
    match node.mine(message.as_bytes()).await {
        Ok(hash) => println!("mined {hash}"),
        Err(err) => println!("mine failed: {err}"),
    }
}

fn handle_mineloop(node: &Arc<Node>, rest: &[&str]) {
    let message = rest.join(" ").into_bytes();
    node.mine_loop_start(message);
    println!("mining loop started");
}

async fn handle_send(node: &Arc<Node>, rest: &[&str]) {
    let (Some(pubkey_hex), Some(amount_str)) = (rest.first(), rest.get(1)) else {
        println!("usage: send <pubkey_hex> <amount>");
        return;
    };
    let Some(to) = PublicKeyBytes::from_hex(pubkey_hex) else {
        println!("invalid public key hex");
        return;
    };
    let Ok(amount) = amount_str.parse::<u64>() else {
        println!("invalid amount");
        return;
    };
    match node.send(to, amount).await {
        Ok(txid) => println!("sent {txid}"),
        Err(err) => println!("send failed: {err}"),
    }
}

fn handle_account(node: &Arc<Node>) {
    let pubkey = {
        let mut wallet = node.wallet.lock();
        match wallet.current_public_key() {
            Some(pk) => pk,
            None => wallet.generate(),
        }
    };
    println!("{}", pubkey.to_hex());
}

fn resolve_key(node: &Arc<Node>, rest: &[&str]) -> Option<PublicKeyBytes> {
    match rest.first() {
        Some(hex) => PublicKeyBytes::from_hex(hex),
        None => node.wallet.lock().current_public_key(),
    }
}

fn handle_balance(node: &Arc<Node>, rest: &[&str]) {
    let Some(key) = resolve_key(node, rest) else {
        println!("no account: run `account` first");
        return;
    };
    println!("{}", node.balance(&key));
}

async fn handle_peer(node: &Arc<Node>, rest: &[&str]) {
    match rest.first().copied() {
        Some("add") => match rest.get(1) {
            Some(addr) => match node.peer_add(addr).await {
                Ok(()) => println!("connected to {addr}"),
                Err(err) => println!("connect failed: {err}"),
            },
            None => println!("usage: peer add <host:port>"),
        },
        Some("list") => {
            for addr in node.peer_list() {
                println!("{addr}");
            }
        }
        _ => println!("usage: peer add <host:port> | peer list"),
    }
}

fn handle_block(node: &Arc<Node>, rest: &[&str]) {
    let hash = match rest.first() {
        Some(hex) => match brook_core::types::Hash256::from_hex(hex) {
            Some(h) => h,
            None => {
                println!("invalid hash");
                return;
            }
        },
        None => node.tip_summary().0,
    };
    match node.block_by_hash(&hash) {
        Some(block) => println!(
            "height={} hash={} prev={} difficulty={} timestamp={} txs={}",
            block.height,
            block.hash(),
            block.prev_hash,
            block.difficulty,
            block.timestamp,
            block.txs.len()
        ),
        None => println!("block not found"),
    }
}

fn handle_blocktxs(node: &Arc<Node>, rest: &[&str]) {
    let Some(hex) = rest.first() else {
        println!("usage: blocktxs <hash>");
        return;
    };
    let Some(hash) = brook_core::types::Hash256::from_hex(hex) else {
        println!("invalid hash");
        return;
    };
    match node.block_by_hash(&hash) {
        Some(block) => {
            for tx in &block.txs {
                println!("{}", tx.txid());
            }
        }
        None => println!("block not found"),
    }
}

fn handle_tx(node: &Arc<Node>, rest: &[&str]) {
    let Some(hex) = rest.first() else {
        println!("usage: tx <txid>");
        return;
    };
    let Some(txid) = brook_core::types::Hash256::from_hex(hex) else {
        println!("invalid txid");
        return;
    };
    match node.transaction_hex(&txid) {
        Some(hex) => println!("{hex}"),
        None => println!("transaction not found in mempool"),
    }
}

fn handle_unspent(node: &Arc<Node>, rest: &[&str]) {
    let Some(key) = resolve_key(node, rest) else {
        println!("no account: run `account` first");
        return;
    };
    for utxo in node.unspent(&key) {
        println!("{}:{} amount={}", utxo.txid, utxo.index, utxo.output.amount);
    }
}

fn handle_import(node: &Arc<Node>, rest: &[&str]) {
    let Some(hex) = rest.first() else {
        println!("usage: importprivatekey <hex>");
        return;
    };
    let Ok(bytes) = hex::decode(hex) else {
        println!("invalid hex");
        return;
    };
    let Ok(secret): Result<[u8; 32], _> = bytes.try_into() else {
        println!("private key must be 32 bytes");
        return;
    };
    match node.wallet.lock().import_private_key(&secret) {
        Ok(pk) => println!("imported {}", pk.to_hex()),
        Err(err) => println!("import failed: {err}"),
    }
}
