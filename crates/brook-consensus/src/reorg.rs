//! Cumulative-work comparison and UTXO snapshot rebuilding for reorgs
//! (§4.F.5, §4.J.1 step 5).

use brook_core::chain_store::ChainStore;
use brook_core::types::{Hash256, UTxOut};
use brook_core::utxo::UtxoSet;
use brook_core::BrookError;

use crate::validator::validate_block_connecting;

/// Whether an incoming branch's cumulative work is enough to replace
/// the local one. Equality favors the incoming branch.
pub fn should_adopt_incoming(incoming_work: u128, local_work: u128) -> bool {
    incoming_work >= local_work
}

/// Rebuild the UTXO set by replaying every block from genesis to
/// `target` (inclusive), in height order. Used after a reorg decision
/// to re-derive state atop the new active chain deterministically,
/// rather than trying to patch the old UTXO set in place.
pub fn rebuild_utxo_snapshot(
    store: &ChainStore,
    target: Hash256,
    max_block_bytes: usize,
) -> Result<UtxoSet, BrookError> {
    let mut chain = store.ancestors(&target, usize::MAX);
    chain.reverse(); // oldest (genesis) first

    let mut utxo = UtxoSet::new();
    let Some(genesis) = chain.first() else {
        return Ok(utxo);
    };
    let genesis_hash = genesis.hash();
    let coinbase = &genesis.txs[0];
    utxo.add(UTxOut::from_block(
        genesis_hash,
        coinbase.txid(),
        0,
        coinbase.outputs[0].clone(),
    ));

    for window in chain.windows(2) {
        let (parent, block) = (window[0], window[1]);
        utxo = validate_block_connecting(store, parent, block, utxo, max_block_bytes, u64::MAX)?;
    }
    Ok(utxo)
}
