//! The full node: wires chain state, the sync engine, peer networking,
//! the miner, and a local wallet behind the public operations the
//! shell and CLI call (§6's command surface).

use std::sync::Arc;

use parking_lot::Mutex as PlMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use brook_consensus::miner::{build_candidate, Miner, MinerOutcome};
use brook_core::codec;
use brook_core::crypto::KeyPair;
use brook_core::error::InsufficientError;
use brook_core::types::{Block, Hash256, PublicKeyBytes, SignatureSlot, Transaction, TxInput, TxOutput, UTxOut};
use brook_network::peer::Inbound;
use brook_network::protocol::TYPE_TXINV;
use brook_network::{PeerTable, SyncEngine};

use crate::config::NodeConfig;
use crate::wallet::Wallet;

/// A running full node: the pieces a shell or CLI drives directly.
pub struct Node {
    pub engine: Arc<SyncEngine>,
    pub peers: Arc<PeerTable>,
    pub wallet: PlMutex<Wallet>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    mine_loop: PlMutex<Option<JoinHandle<()>>>,
    node_id: String,
}

impl Node {
    /// Start the node: bind the listener, spawn the dispatch and
    /// discovery loops, and return the handle the shell/CLI drives.
    pub async fn start(config: NodeConfig) -> anyhow::Result<Arc<Self>> {
        let node_id = uuid::Uuid::new_v4().to_string();
        let peers = Arc::new(PeerTable::new());
        let engine = Arc::new(SyncEngine::new(
            config.max_data_bytes,
            node_id.clone(),
            config.listen_address.clone(),
            peers.clone(),
        ));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        {
            let bind = config.bind_address.clone();
            let peers = peers.clone();
            let inbound_tx = inbound_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = brook_network::listener::accept_loop(&bind, peers, inbound_tx).await {
                    warn!(%err, "listener stopped");
                }
            });
        }
        {
            let engine = engine.clone();
            let peers = peers.clone();
            let inbound_tx = inbound_tx.clone();
            tokio::spawn(brook_network::listener::dispatch_loop(inbound_rx, engine, peers, inbound_tx));
        }
        brook_network::discovery::spawn_discovery_loop(
            peers.clone(),
            node_id.clone(),
            config.listen_address.clone(),
            inbound_tx.clone(),
        );

        Ok(Arc::new(Self {
            engine,
            peers,
            wallet: PlMutex::new(Wallet::new()),
            inbound_tx,
            mine_loop: PlMutex::new(None),
            node_id,
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Connect outbound to `addr` and register the resulting peer.
    /// Rejects outright if `addr` is our own advertised address: the
    /// `nodeinfo` round trip only catches self-connects from the
    /// listener side, so the dialer side is guarded here instead.
    pub async fn peer_add(&self, addr: &str) -> anyhow::Result<()> {
        let listen = self.engine.listen_address.clone();
        if listen.as_deref() == Some(addr) {
            return Err(brook_core::error::ProtocolError::SelfConnect.into());
        }
        let handle = brook_network::handshake::connect(addr, &self.node_id, listen.as_deref(), self.inbound_tx.clone()).await?;
        self.peers.insert(handle.clone());
        self.engine.greet_new_peer(&handle);
        brook_network::discovery::query_and_remember(&handle, &self.peers).await;
        Ok(())
    }

    pub fn peer_list(&self) -> Vec<String> {
        self.peers.all().iter().map(|p| p.remote_addr().to_string()).collect()
    }

    /// Mine a single block tagging the coinbase with `message`, blocking
    /// the calling task until it is found (the search still yields to
    /// the runtime between chunks via `tokio::task::yield_now`).
    pub async fn mine(&self, message: &[u8]) -> anyhow::Result<Hash256> {
        let miner_key = self
            .wallet
            .lock()
            .current_public_key()
            .ok_or_else(|| anyhow::anyhow!("no account: run `account` first"))?;
        let mut candidate = {
            let state = self.engine.state.lock();
            build_candidate(&state.chain, &state.mempool, miner_key, self.engine.max_block_bytes, now_ms())
        };
        candidate.txs[0].inputs[0].signature = SignatureSlot::from_message(message);

        let mut miner = Miner::new(candidate);
        loop {
            miner.run_chunk();
            if miner.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        match miner.outcome().cloned() {
            Some(MinerOutcome::Found(block)) => {
                let hash = block.hash();
                self.engine.ingest_local_block(block)?;
                Ok(hash)
            }
            _ => Err(anyhow::anyhow!("mining cancelled")),
        }
    }

    /// Start a background loop that repeatedly mines blocks until
    /// [`Node::stop_mine_loop`] is called.
    pub fn mine_loop_start(self: &Arc<Self>, message: Vec<u8>) {
        let node = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = node.mine(&message).await {
                    warn!(%err, "mine loop iteration stopped");
                    break;
                }
            }
        });
        *self.mine_loop.lock() = Some(handle);
    }

    pub fn stop_mine_loop(&self) {
        if let Some(handle) = self.mine_loop.lock().take() {
            handle.abort();
        }
        if let Some(miner) = self.engine.miner.lock().as_mut() {
            miner.cancel();
        }
    }

    /// Build, sign, validate, and gossip a transaction paying `amount`
    /// to `to`, spending the current account's UTXOs.
    pub async fn send(&self, to: PublicKeyBytes, amount: u64) -> anyhow::Result<Hash256> {
        let (from, secret) = {
            let wallet = self.wallet.lock();
            let kp = wallet
                .current_keypair()
                .ok_or_else(|| anyhow::anyhow!("no account: run `account` first"))?;
            (kp.public_key_bytes(), kp.secret_bytes())
        };
        let keypair = KeyPair::from_secret_bytes(&secret)?;

        let (inputs, total_in) = {
            let state = self.engine.state.lock();
            let mut total = 0u64;
            let mut inputs = Vec::new();
            for utxo in state.utxo.filter_by_owner(&from) {
                if total >= amount {
                    break;
                }
                inputs.push((utxo.txid, utxo.index));
                total += utxo.output.amount;
            }
            (inputs, total)
        };
        if total_in < amount {
            return Err(InsufficientError::Balance { have: total_in, need: amount }.into());
        }

        let unsigned_inputs: Vec<TxInput> = inputs
            .iter()
            .map(|(txid, index)| TxInput {
                prev_txid: *txid,
                prev_index: *index,
                signature: SignatureSlot::EMPTY,
            })
            .collect();

        let mut outputs = vec![TxOutput { amount, public_key: to }];
        let change = total_in - amount;
        let estimated_bytes = 8 + 108 * unsigned_inputs.len() + 73 * (outputs.len() + 1);
        let estimated_fee = estimated_bytes as u64 * brook_core::constants::MIN_FEE_RATE;
        if change > estimated_fee {
            outputs.push(TxOutput {
                amount: change - estimated_fee,
                public_key: from,
            });
        }

        let mut tx = Transaction {
            inputs: unsigned_inputs,
            outputs,
        };
        let txid = tx.txid();
        let sig = keypair.sign(&txid);
        for input in &mut tx.inputs {
            input.signature = sig;
        }

        let fee_paid = {
            let state = self.engine.state.lock();
            let mut probe = state.utxo.snapshot();
            brook_consensus::validator::validate_and_apply_transaction(&tx, Hash256::ZERO, &mut probe)?
        };
        {
            let mut state = self.engine.state.lock();
            state.mempool.insert(tx.clone(), fee_paid)?;
        }
        for peer in self.peers.sample(brook_core::constants::BROADCAST_FANOUT) {
            peer.send(TYPE_TXINV, serde_json::json!({"txids": [txid.to_hex()]}));
        }
        Ok(txid)
    }

    pub fn balance(&self, key: &PublicKeyBytes) -> u64 {
        self.engine.state.lock().utxo.balance_of(key)
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Option<Block> {
        self.engine.state.lock().chain.get(hash).cloned()
    }

    pub fn tip_summary(&self) -> (Hash256, u64) {
        let state = self.engine.state.lock();
        (state.chain.tip_hash(), state.chain.height())
    }

    pub fn transaction_hex(&self, txid: &Hash256) -> Option<String> {
        let state = self.engine.state.lock();
        state.mempool.get(txid).map(|tx| hex::encode(codec::encode_transaction(tx)))
    }

    pub fn unspent(&self, key: &PublicKeyBytes) -> Vec<UTxOut> {
        self.engine.state.lock().utxo.filter_by_owner(key).cloned().collect()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
