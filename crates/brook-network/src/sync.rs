//! The sync engine (§4.J): ingesting block and transaction inventory,
//! gap-filling missing ancestors, and responding to peer queries.
//!
//! Chain mutation is guarded by a single mutex rather than an explicit
//! task queue — the design notes in §5 call the two realizations
//! equivalent ("a single-threaded cooperative executor or a
//! thread-per-peer design guarded by a single mutex"). Every mutating
//! operation below takes the lock for the whole of its validate-then-
//! commit sequence, so two ingestions can never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use brook_consensus::miner::Miner;
use brook_consensus::reorg::{rebuild_utxo_snapshot, should_adopt_incoming};
use brook_consensus::validator::validate_block_connecting;
use brook_core::chain_store::ChainStore;
use brook_core::codec;
use brook_core::constants::{GAP_FILL_INITIAL_BATCH, GAP_FILL_MAX_BATCH};
use brook_core::error::{ChainError, ProtocolError};
use brook_core::mempool::Mempool;
use brook_core::types::{Block, Hash256, Transaction};
use brook_core::utxo::UtxoSet;
use brook_core::BrookError;

use crate::peer::PeerHandle;
use crate::peer_table::PeerTable;
use crate::protocol::{BlockInv, GetBlock, GetTx, PeersResponse, TxInv, TxsResponse};
use crate::protocol::{TYPE_BLOCKINV, TYPE_GETPEERS, TYPE_TXINV};

/// Chain store, UTXO set, and mempool bundled as the unit of state a
/// sync operation mutates atomically.
pub struct ChainState {
    pub chain: ChainStore,
    pub utxo: UtxoSet,
    pub mempool: Mempool,
}

impl ChainState {
    pub fn new() -> Self {
        let chain = ChainStore::new();
        let genesis = chain.tip().clone();
        let mut utxo = UtxoSet::new();
        let coinbase = &genesis.txs[0];
        utxo.add(brook_core::types::UTxOut::from_block(
            genesis.hash(),
            coinbase.txid(),
            0,
            coinbase.outputs[0].clone(),
        ));
        Self {
            chain,
            utxo,
            mempool: Mempool::new(),
        }
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared sync engine: owns chain state, validates and commits inbound
/// blocks/transactions, and answers peer queries.
pub struct SyncEngine {
    pub state: Arc<Mutex<ChainState>>,
    pub peers: Arc<PeerTable>,
    pub max_block_bytes: usize,
    pub node_id: String,
    pub listen_address: Option<String>,
    /// The currently running miner, cancelled whenever the tip moves.
    pub miner: Arc<Mutex<Option<Miner>>>,
}

impl SyncEngine {
    pub fn new(
        max_block_bytes: usize,
        node_id: String,
        listen_address: Option<String>,
        peers: Arc<PeerTable>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::new())),
            peers,
            max_block_bytes,
            node_id,
            listen_address,
            miner: Arc::new(Mutex::new(None)),
        }
    }

    fn cancel_miner(&self) {
        if let Some(miner) = self.miner.lock().as_mut() {
            miner.cancel();
        }
    }

    /// Broadcast to `min(|peers|, BROADCAST_FANOUT)` peers uniformly
    /// without replacement (§4.I.3).
    fn broadcast(&self, kind: &str, data: serde_json::Value) {
        for peer in self.peers.sample(brook_core::constants::BROADCAST_FANOUT) {
            peer.send(kind, data.clone());
        }
    }

    /// Ingest a locally mined block: it always extends the current tip
    /// directly, since [`brook_consensus::miner::build_candidate`]
    /// builds atop the live tip snapshot.
    pub fn ingest_local_block(&self, block: Block) -> Result<(), BrookError> {
        let mut state = self.state.lock();
        let parent = state.chain.tip().clone();
        let utxo = state.utxo.snapshot();
        let updated = validate_block_connecting(
            &state.chain,
            &parent,
            &block,
            utxo,
            self.max_block_bytes,
            now_ms(),
        )?;
        let hash = block.hash();
        state.chain.insert(block.clone())?;
        state.chain.set_tip(hash)?;
        state.mempool.drop_confirmed_and_conflicting(&block.txs);
        state.utxo = updated;
        let ChainState { utxo, mempool, .. } = &mut *state;
        mempool.drop_orphaned_by_missing_inputs(utxo);
        drop(state);
        self.cancel_miner();
        self.broadcast(
            TYPE_BLOCKINV,
            serde_json::to_value(BlockInv {
                hash: hash.to_hex(),
                height: block.height,
            })
            .unwrap(),
        );
        Ok(())
    }

    /// Ingest a `blockinv` announcement from `source`, gap-filling
    /// backward until a known ancestor is found (§4.J.1).
    pub async fn ingest_block_inv(
        &self,
        inv: BlockInv,
        source: PeerHandle,
    ) -> Result<(), BrookError> {
        let Some(hash0) = Hash256::from_hex(&inv.hash) else {
            return Err(ProtocolError::MalformedJson("blockinv.hash".into()).into());
        };
        if self.state.lock().chain.contains(&hash0) {
            return Ok(());
        }

        let response = source
            .request(
                crate::protocol::TYPE_GETBLOCK,
                serde_json::to_value(GetBlock::ByHashes {
                    hash: vec![inv.hash.clone()],
                })
                .unwrap(),
            )
            .await
            .map_err(|_| ChainError::BlockNotFound(inv.hash.clone()))?;
        let block0 = decode_block_hex_map(&response, &hash0)
            .ok_or_else(|| ChainError::BlockNotFound(inv.hash.clone()))?;

        let mut orphans: HashMap<Hash256, Block> = HashMap::new();
        orphans.insert(hash0, block0.clone());
        let mut block = block0;
        let mut frontier = hash0;
        let mut batch = GAP_FILL_INITIAL_BATCH;

        loop {
            let known_parent = self.state.lock().chain.contains(&block.prev_hash);
            if known_parent {
                break;
            }
            let response = source
                .request(
                    crate::protocol::TYPE_GETBLOCK,
                    serde_json::to_value(GetBlock::Frontier {
                        frontier: frontier.to_hex(),
                        batch,
                    })
                    .unwrap(),
                )
                .await
                .map_err(|_| ChainError::BlockNotFound(frontier.to_hex()))?;
            let fetched = decode_hex_map(&response);
            if fetched.is_empty() {
                return Err(ChainError::BlockNotFound(block.prev_hash.to_hex()).into());
            }
            let Some(parent) = fetched.get(&block.prev_hash) else {
                return Err(ChainError::BlockNotFound(block.prev_hash.to_hex()).into());
            };
            orphans.insert(block.prev_hash, parent.clone());
            block = parent.clone();
            frontier = block.hash();
            batch = (batch * 2).min(GAP_FILL_MAX_BATCH);
        }

        self.validate_and_commit_segment(hash0, orphans)
    }

    /// Validate the gap-filled segment (oldest-first from the known
    /// fork point to `tip_hash`) and commit it, choosing the extension
    /// or reorg path per §4.J.1 step 5.
    fn validate_and_commit_segment(
        &self,
        tip_hash: Hash256,
        orphans: HashMap<Hash256, Block>,
    ) -> Result<(), BrookError> {
        let mut state = self.state.lock();

        // Order oldest-first by walking from tip_hash back through
        // `orphans` until we reach a block whose parent is already known.
        let mut ordered = Vec::new();
        let mut cursor = tip_hash;
        loop {
            let Some(b) = orphans.get(&cursor) else { break };
            ordered.push(b.clone());
            if state.chain.contains(&b.prev_hash) {
                break;
            }
            cursor = b.prev_hash;
        }
        ordered.reverse();
        let Some(first) = ordered.first() else {
            return Err(ChainError::BlockNotFound(tip_hash.to_hex()).into());
        };
        let fork_hash = first.prev_hash;
        let is_extension = state.chain.tip_hash() == fork_hash;

        // Insert the segment into a scratch copy of the store so
        // validator lookups (MTP, retarget ancestry) can see it.
        let mut scratch = state.chain.clone();
        for b in &ordered {
            scratch.insert(b.clone()).ok();
        }

        let mut utxo = if is_extension {
            state.utxo.snapshot()
        } else {
            rebuild_utxo_snapshot(&scratch, fork_hash, self.max_block_bytes)?
        };

        let mut parent = scratch.get(&fork_hash).cloned().ok_or(ChainError::BlockNotFound(fork_hash.to_hex()))?;
        for b in &ordered {
            utxo = validate_block_connecting(&scratch, &parent, b, utxo, self.max_block_bytes, now_ms())?;
            parent = b.clone();
        }

        if !is_extension {
            let incoming_work: u128 = ordered.iter().map(|b| b.work()).sum();
            let local_work = state
                .chain
                .cumulative_work(&state.chain.tip_hash())
                .unwrap_or(0)
                .saturating_sub(state.chain.cumulative_work(&fork_hash).unwrap_or(0));
            if !should_adopt_incoming(incoming_work, local_work) {
                return Err(brook_core::error::ReorgError::InsufficientWork {
                    incoming: incoming_work,
                    local: local_work,
                }
                .into());
            }
            state.chain.prune_suffix_after(&fork_hash);
        }

        for b in &ordered {
            if !state.chain.contains(&b.hash()) {
                state.chain.insert(b.clone())?;
            }
        }
        state.chain.set_tip(tip_hash)?;
        state.utxo = utxo;
        let tip_txs: Vec<Transaction> = ordered.iter().flat_map(|b| b.txs.clone()).collect();
        state.mempool.drop_confirmed_and_conflicting(&tip_txs);
        let ChainState { utxo, mempool, .. } = &mut *state;
        mempool.drop_orphaned_by_missing_inputs(utxo);
        let height = state.chain.height();
        drop(state);
        self.cancel_miner();
        self.broadcast(
            TYPE_BLOCKINV,
            serde_json::to_value(BlockInv {
                hash: tip_hash.to_hex(),
                height,
            })
            .unwrap(),
        );
        Ok(())
    }

    /// Ingest offered transaction ids from `source`: fetch bodies,
    /// validate each against the live UTXO set, insert into mempool,
    /// and re-broadcast the ones that were new and valid (§4.J.2).
    pub async fn ingest_tx_inv(&self, inv: TxInv, source: PeerHandle) -> Result<(), BrookError> {
        let unknown: Vec<String> = {
            let state = self.state.lock();
            inv.txids
                .into_iter()
                .filter(|hex| {
                    Hash256::from_hex(hex)
                        .map(|h| !state.mempool.contains(&h))
                        .unwrap_or(false)
                })
                .collect()
        };
        if unknown.is_empty() {
            return Ok(());
        }
        let response = source
            .request(
                crate::protocol::TYPE_GETTX,
                serde_json::to_value(GetTx {
                    txids: Some(unknown),
                })
                .unwrap(),
            )
            .await
            .map_err(|_| ProtocolError::MalformedJson("gettx response".into()))?;
        let txs_resp: TxsResponse = serde_json::from_value(response)
            .map_err(|_| ProtocolError::MalformedJson("gettx response".into()))?;

        let mut valid = Vec::new();
        let mut state = self.state.lock();
        for hex_tx in txs_resp.txs {
            let Ok(bytes) = hex::decode(&hex_tx) else { continue };
            let Ok((tx, _)) = codec::decode_transaction(&bytes) else { continue };
            let txid = tx.txid();
            let mut probe = state.utxo.snapshot();
            let fee_result = brook_consensus::validator::validate_and_apply_transaction(
                &tx,
                Hash256::ZERO,
                &mut probe,
            );
            match fee_result {
                Ok(fee) => {
                    if state.mempool.insert(tx, fee).is_ok() {
                        valid.push(txid.to_hex());
                    }
                }
                Err(err) => warn!(%err, "rejected inbound transaction"),
            }
        }
        drop(state);
        if !valid.is_empty() {
            self.broadcast(TYPE_TXINV, serde_json::to_value(TxInv { txids: valid }).unwrap());
        }
        Ok(())
    }

    /// Respond to a peer's `getblock`, `gettx`, or `getpeers` request.
    pub fn respond_to_request(&self, peer: &PeerHandle, kind: &str, id: Option<u64>, data: serde_json::Value) {
        match kind {
            crate::protocol::TYPE_GETBLOCK => {
                let reply = self.handle_getblock(data);
                peer.respond(id, reply);
            }
            crate::protocol::TYPE_GETTX => {
                let reply = self.handle_gettx(data);
                peer.respond(id, reply);
            }
            TYPE_GETPEERS => {
                let reply = self.handle_getpeers(peer);
                peer.respond(id, reply);
            }
            other => warn!(kind = other, "unhandled request type"),
        }
    }

    fn handle_getblock(&self, data: serde_json::Value) -> serde_json::Value {
        let state = self.state.lock();
        match serde_json::from_value::<GetBlock>(data) {
            Ok(GetBlock::ByHashes { hash }) => {
                let mut map = serde_json::Map::new();
                for h in hash {
                    let hex = Hash256::from_hex(&h)
                        .and_then(|hh| state.chain.get(&hh))
                        .map(|b| hex::encode(codec::encode_block(b)))
                        .unwrap_or_default();
                    map.insert(h, serde_json::Value::String(hex));
                }
                serde_json::Value::Object(map)
            }
            Ok(GetBlock::Frontier { frontier, batch }) => {
                let mut map = serde_json::Map::new();
                if let Some(hash) = Hash256::from_hex(&frontier) {
                    let ancestors = state.chain.ancestors(&hash, batch + 1);
                    for b in ancestors.into_iter().skip(1) {
                        map.insert(b.hash().to_hex(), serde_json::Value::String(hex::encode(codec::encode_block(b))));
                    }
                }
                serde_json::Value::Object(map)
            }
            Err(_) => serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    fn handle_gettx(&self, data: serde_json::Value) -> serde_json::Value {
        let state = self.state.lock();
        let req: GetTx = serde_json::from_value(data).unwrap_or_default();
        let txs: Vec<String> = match req.txids {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| Hash256::from_hex(&id))
                .filter_map(|h| state.mempool.get(&h))
                .map(|tx| hex::encode(codec::encode_transaction(tx)))
                .collect(),
            None => state
                .mempool
                .order_by_fees_desc()
                .into_iter()
                .map(|(tx, _)| hex::encode(codec::encode_transaction(tx)))
                .collect(),
        };
        serde_json::to_value(TxsResponse { txs }).unwrap()
    }

    fn handle_getpeers(&self, requester: &PeerHandle) -> serde_json::Value {
        let addrs = self.peers.advertised_addresses(requester.listen_address().as_deref());
        serde_json::to_value(PeersResponse { peers: addrs }).unwrap()
    }

    /// On a new connection (either direction), announce our tip and
    /// mempool contents (§4.J.2's "on new peer connect" rule).
    pub fn greet_new_peer(&self, peer: &PeerHandle) {
        let state = self.state.lock();
        let tip = state.chain.tip();
        peer.send(
            TYPE_BLOCKINV,
            serde_json::to_value(BlockInv {
                hash: tip.hash().to_hex(),
                height: tip.height,
            })
            .unwrap(),
        );
        let txids: Vec<String> = state
            .mempool
            .order_by_fees_desc()
            .into_iter()
            .map(|(tx, _)| tx.txid().to_hex())
            .collect();
        if !txids.is_empty() {
            peer.send(TYPE_TXINV, serde_json::to_value(TxInv { txids }).unwrap());
        }
    }
}

fn decode_hex_map(value: &serde_json::Value) -> HashMap<Hash256, Block> {
    let mut out = HashMap::new();
    let Some(obj) = value.as_object() else { return out };
    for (_, v) in obj {
        let Some(hex_str) = v.as_str() else { continue };
        if hex_str.is_empty() {
            continue;
        }
        let Ok(bytes) = hex::decode(hex_str) else { continue };
        let Ok(block) = codec::decode_block(&bytes) else { continue };
        out.insert(block.hash(), block);
    }
    out
}

fn decode_block_hex_map(value: &serde_json::Value, expect: &Hash256) -> Option<Block> {
    let map = decode_hex_map(value);
    map.get(expect).cloned()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
