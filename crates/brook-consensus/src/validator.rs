//! Per-block and per-transaction validation (§4.F.3, §4.F.4).

use brook_core::chain_store::ChainStore;
use brook_core::constants::{MAX_FUTURE_DRIFT_MS, MIN_FEE_RATE};
use brook_core::crypto;
use brook_core::error::{CapacityError, CoinbaseError, ContinuityError, ProofError, TxError};
use brook_core::reward::subsidy_at;
use brook_core::types::{Block, Transaction};
use brook_core::utxo::UtxoSet;
use brook_core::BrookError;

use crate::difficulty::{expected_difficulty, median_time_past};

/// Validate a non-coinbase transaction against `utxo` and apply it,
/// returning the fee paid. `utxo` is mutated in place: referenced
/// outputs are removed and the transaction's own outputs inserted.
pub fn validate_and_apply_transaction(
    tx: &Transaction,
    block_hash: brook_core::types::Hash256,
    utxo: &mut UtxoSet,
) -> Result<u64, BrookError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TxError::EmptyInputsOrOutputs.into());
    }
    let txid = tx.txid();
    let mut sum_in = 0u64;
    for (index, input) in tx.inputs.iter().enumerate() {
        let Some(spent) = utxo.get(&input.prev_txid, input.prev_index) else {
            return Err(TxError::MissingInput(format!(
                "{}:{}",
                input.prev_txid, input.prev_index
            ))
            .into());
        };
        if input.signature.is_empty() {
            return Err(TxError::UnsignedInput { index }.into());
        }
        if !crypto::verify(&txid, &input.signature, &spent.output.public_key) {
            return Err(TxError::InvalidSignature { index }.into());
        }
        sum_in += spent.output.amount;
    }
    let sum_out = tx.output_value();
    if sum_in < sum_out {
        return Err(TxError::InsufficientInputs { sum_in, sum_out }.into());
    }
    let fee = sum_in - sum_out;
    let min_fee = tx.bytes_length() as u64 * MIN_FEE_RATE;
    if fee < min_fee {
        return Err(TxError::FeeBelowMinimum {
            fee,
            min: min_fee,
            bytes: tx.bytes_length(),
        }
        .into());
    }
    for input in &tx.inputs {
        utxo.remove(&input.prev_txid, input.prev_index);
    }
    for (index, output) in tx.outputs.iter().enumerate() {
        utxo.add(brook_core::types::UTxOut::from_block(
            block_hash,
            txid,
            index as u32,
            output.clone(),
        ));
    }
    Ok(fee)
}

fn validate_and_apply_coinbase(
    coinbase: &Transaction,
    height: u64,
    block_hash: brook_core::types::Hash256,
    total_fees: u64,
    utxo: &mut UtxoSet,
) -> Result<(), BrookError> {
    if coinbase.inputs.len() != 1 {
        return Err(CoinbaseError::WrongInputCount(coinbase.inputs.len()).into());
    }
    if coinbase.outputs.len() != 1 {
        return Err(CoinbaseError::WrongOutputCount(coinbase.outputs.len()).into());
    }
    let got = coinbase.inputs[0].prev_index as u64;
    if got != height {
        return Err(CoinbaseError::BadHeightMarker { expected: height, got }.into());
    }
    let max = subsidy_at(height) + total_fees;
    let amount = coinbase.outputs[0].amount;
    if amount > max {
        return Err(CoinbaseError::RewardTooHigh { got: amount, max }.into());
    }
    let txid = coinbase.txid();
    utxo.add(brook_core::types::UTxOut::from_block(
        block_hash,
        txid,
        0,
        coinbase.outputs[0].clone(),
    ));
    Ok(())
}

/// Validate `block` as a direct child of `parent` and apply its
/// transactions atop `utxo`, which is taken by value and returned
/// updated on success (left untouched on error). `store` must already
/// contain `parent` and every already-validated ancestor needed for
/// difficulty retargeting and MTP lookups.
pub fn validate_block_connecting(
    store: &ChainStore,
    parent: &Block,
    block: &Block,
    mut utxo: UtxoSet,
    max_block_bytes: usize,
    now_ms: u64,
) -> Result<UtxoSet, BrookError> {
    if block.height != parent.height + 1 {
        return Err(ContinuityError::BadHeight {
            expected: parent.height + 1,
            got: block.height,
        }
        .into());
    }
    if block.prev_hash != parent.hash() {
        return Err(ContinuityError::BadPrevHash.into());
    }
    let mtp = median_time_past(store, parent);
    if block.timestamp < mtp {
        return Err(ContinuityError::TimestampNotAfterMtp {
            timestamp: block.timestamp,
            mtp,
        }
        .into());
    }
    if block.timestamp > now_ms + MAX_FUTURE_DRIFT_MS {
        return Err(ContinuityError::TimestampTooFarFuture {
            timestamp: block.timestamp,
            now: now_ms,
        }
        .into());
    }
    let expected = expected_difficulty(store, parent);
    if block.difficulty != expected {
        return Err(ContinuityError::BadDifficulty {
            expected,
            got: block.difficulty,
        }
        .into());
    }
    // Genesis has no parent of its own; its proof is trusted bootstrap
    // data rather than a rule-checked one (see brook_core::genesis).
    if parent.height != 0 && !parent.satisfies_own_pow() {
        return Err(ProofError::InsufficientWork {
            required: parent.difficulty,
        }
        .into());
    }
    let size = block.total_tx_bytes();
    if size > max_block_bytes {
        return Err(CapacityError::BlockTooLarge {
            size,
            max: max_block_bytes,
        }
        .into());
    }
    if block.hash().leading_zero_bits() < block.difficulty as u32 {
        return Err(ProofError::InsufficientWork {
            required: block.difficulty,
        }
        .into());
    }
    let Some((coinbase, rest)) = block.txs.split_first() else {
        return Err(CoinbaseError::Missing.into());
    };
    if !coinbase.is_coinbase() {
        return Err(CoinbaseError::Missing.into());
    }
    let block_hash = block.hash();
    let mut total_fees = 0u64;
    for tx in rest {
        total_fees += validate_and_apply_transaction(tx, block_hash, &mut utxo)?;
    }
    validate_and_apply_coinbase(coinbase, block.height, block_hash, total_fees, &mut utxo)?;
    Ok(utxo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_core::reward::subsidy_at;
    use brook_core::types::{build_coinbase, PublicKeyBytes};

    fn child(parent: &Block, difficulty: u8, timestamp: u64) -> Block {
        let coinbase = build_coinbase(
            PublicKeyBytes([7; 65]),
            subsidy_at(parent.height + 1),
            parent.height + 1,
            b"m",
        );
        let mut block = Block {
            height: parent.height + 1,
            timestamp,
            prev_hash: parent.hash(),
            difficulty,
            nonce: [0u8; 32],
            txs: vec![coinbase],
        };
        mine_for_test(&mut block);
        block
    }

    /// Deterministic brute-force nonce search used only so tests have a
    /// block whose own proof-of-work is valid, without depending on the
    /// real cooperative miner.
    fn mine_for_test(block: &mut Block) {
        let mut counter: u64 = 0;
        while !block.satisfies_own_pow() {
            block.nonce[..8].copy_from_slice(&counter.to_be_bytes());
            counter += 1;
        }
    }

    #[test]
    fn valid_child_is_accepted() {
        let store = ChainStore::new();
        let parent = store.tip().clone();
        let b = child(&parent, parent.difficulty, parent.timestamp + 10_000);
        let result = validate_block_connecting(
            &store,
            &parent,
            &b,
            UtxoSet::new(),
            10_240,
            parent.timestamp + 20_000,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn wrong_height_rejected() {
        let store = ChainStore::new();
        let parent = store.tip().clone();
        let mut b = child(&parent, parent.difficulty, parent.timestamp + 10_000);
        b.height = 5;
        let err = validate_block_connecting(
            &store,
            &parent,
            &b,
            UtxoSet::new(),
            10_240,
            parent.timestamp + 20_000,
        );
        assert!(matches!(err, Err(BrookError::Continuity(ContinuityError::BadHeight { .. }))));
    }

    #[test]
    fn future_timestamp_rejected() {
        let store = ChainStore::new();
        let parent = store.tip().clone();
        let b = child(&parent, parent.difficulty, parent.timestamp + 1_000_000_000);
        let err = validate_block_connecting(&store, &parent, &b, UtxoSet::new(), 10_240, parent.timestamp);
        assert!(matches!(
            err,
            Err(BrookError::Continuity(ContinuityError::TimestampTooFarFuture { .. }))
        ));
    }

    #[test]
    fn coinbase_overpayment_rejected() {
        let store = ChainStore::new();
        let parent = store.tip().clone();
        let mut b = child(&parent, parent.difficulty, parent.timestamp + 10_000);
        b.txs[0].outputs[0].amount = subsidy_at(1) + 1;
        mine_for_test(&mut b);
        let err = validate_block_connecting(
            &store,
            &parent,
            &b,
            UtxoSet::new(),
            10_240,
            parent.timestamp + 20_000,
        );
        assert!(matches!(err, Err(BrookError::Coinbase(CoinbaseError::RewardTooHigh { .. }))));
    }

    #[test]
    fn oversized_block_rejected() {
        let store = ChainStore::new();
        let parent = store.tip().clone();
        let b = child(&parent, parent.difficulty, parent.timestamp + 10_000);
        let err = validate_block_connecting(&store, &parent, &b, UtxoSet::new(), 0, parent.timestamp + 20_000);
        assert!(matches!(err, Err(BrookError::Capacity(CapacityError::BlockTooLarge { .. }))));
    }
}
