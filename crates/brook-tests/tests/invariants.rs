//! Universal invariants (§8) exercised directly against brook-core and
//! brook-consensus, without any networking.

use brook_core::chain_store::ChainStore;
use brook_core::codec::{decode_block, encode_block};
use brook_core::constants::PUBLIC_KEY_BYTES;
use brook_core::mempool::Mempool;
use brook_core::reward::subsidy_at;
use brook_core::types::{build_coinbase, Block, Hash256, PublicKeyBytes, SignatureSlot};
use brook_core::utxo::UtxoSet;
use brook_consensus::miner::{build_candidate, Miner, MinerOutcome};
use brook_consensus::validator::validate_block_connecting;

fn pk(byte: u8) -> PublicKeyBytes {
    PublicKeyBytes([byte; PUBLIC_KEY_BYTES])
}

fn mine_block(store: &ChainStore, mempool: &Mempool, miner_key: PublicKeyBytes, now: u64) -> Block {
    let candidate = build_candidate(store, mempool, miner_key, 10_240, now);
    let mut miner = Miner::new(candidate);
    loop {
        miner.run_chunk();
        if miner.is_finished() {
            break;
        }
    }
    match miner.outcome().cloned() {
        Some(MinerOutcome::Found(block)) => block,
        other => panic!("expected a found block, got {other:?}"),
    }
}

#[test]
fn codec_round_trip_preserves_structure_and_hash() {
    let coinbase = build_coinbase(pk(1), subsidy_at(1), 1, b"round trip");
    let block = Block {
        height: 1,
        timestamp: 1_700_000_000_000,
        prev_hash: Hash256([0x22; 32]),
        difficulty: 3,
        nonce: [0x99; 32],
        txs: vec![coinbase],
    };
    let bytes = encode_block(&block);
    let decoded = decode_block(&bytes).unwrap();
    assert_eq!(decoded, block);
    assert_eq!(decoded.hash(), block.hash());
}

#[test]
fn txid_independent_of_signature() {
    let mut tx = build_coinbase(pk(2), 100, 0, b"a");
    let txid_before = tx.txid();
    tx.inputs[0].signature = SignatureSlot::from_message(b"entirely different bytes");
    assert_eq!(tx.txid(), txid_before);
}

#[test]
fn proof_property_holds_for_mined_blocks() {
    let store = ChainStore::new();
    let mempool = Mempool::new();
    let block = mine_block(&store, &mempool, pk(3), 1_700_000_000_000);
    assert!(block.hash().leading_zero_bits() >= block.difficulty as u32);
}

#[test]
fn utxo_consistency_after_accepted_block() {
    let mut store = ChainStore::new();
    let mempool = Mempool::new();
    let genesis = store.tip().clone();
    let mut utxo = UtxoSet::new();
    let genesis_coinbase = &genesis.txs[0];
    utxo.add(brook_core::types::UTxOut::from_block(
        genesis.hash(),
        genesis_coinbase.txid(),
        0,
        genesis_coinbase.outputs[0].clone(),
    ));

    let block = mine_block(&store, &mempool, pk(4), genesis.timestamp + 10_000);
    let updated = validate_block_connecting(&store, &genesis, &block, utxo, 10_240, genesis.timestamp + 20_000).unwrap();
    let hash = block.hash();
    store.insert(block.clone()).unwrap();
    store.set_tip(hash).unwrap();

    let coinbase = &block.txs[0];
    assert!(updated.contains(&coinbase.txid(), 0));
    assert_eq!(updated.get(&coinbase.txid(), 0).unwrap().output.amount, coinbase.outputs[0].amount);
}

#[test]
fn fee_lower_bound_enforced_at_connect_time() {
    use brook_consensus::validator::validate_and_apply_transaction;
    use brook_core::types::{TxInput, TxOutput, Transaction};

    let kp = brook_core::crypto::KeyPair::generate();
    let mut utxo = UtxoSet::new();
    let funding_txid = Hash256([7; 32]);
    utxo.add(brook_core::types::UTxOut::from_block(
        Hash256::ZERO,
        funding_txid,
        0,
        TxOutput { amount: 1_000, public_key: kp.public_key_bytes() },
    ));

    let mut tx = Transaction {
        inputs: vec![TxInput {
            prev_txid: funding_txid,
            prev_index: 0,
            signature: SignatureSlot::EMPTY,
        }],
        outputs: vec![TxOutput { amount: 1_000, public_key: pk(6) }],
    };
    let txid = tx.txid();
    tx.inputs[0].signature = kp.sign(&txid);

    // sum_in == sum_out: zero fee, below the per-byte minimum.
    let err = validate_and_apply_transaction(&tx, Hash256::ZERO, &mut utxo);
    assert!(matches!(
        err,
        Err(brook_core::BrookError::Tx(brook_core::error::TxError::FeeBelowMinimum { .. }))
    ));
}
