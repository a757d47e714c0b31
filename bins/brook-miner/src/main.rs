//! Standalone miner demo: mines a small local chain in-process, with no
//! networking, to exercise the cooperative search loop on its own.

use clap::Parser;

use brook_consensus::miner::{build_candidate, Miner, MinerOutcome};
use brook_consensus::validator::validate_block_connecting;
use brook_core::chain_store::ChainStore;
use brook_core::crypto::KeyPair;
use brook_core::mempool::Mempool;
use brook_core::utxo::UtxoSet;

#[derive(Parser)]
#[command(name = "brook-miner", about = "Mine a standalone demo chain")]
struct Args {
    /// Number of blocks to mine before exiting.
    #[arg(long, default_value_t = 5)]
    blocks: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let miner_key = KeyPair::generate().public_key_bytes();
    let mut store = ChainStore::new();
    let mempool = Mempool::new();
    let mut utxo = UtxoSet::new();
    {
        let genesis = store.tip();
        let coinbase = &genesis.txs[0];
        utxo.add(brook_core::types::UTxOut::from_block(
            genesis.hash(),
            coinbase.txid(),
            0,
            coinbase.outputs[0].clone(),
        ));
    }

    for i in 0..args.blocks {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let candidate = build_candidate(&store, &mempool, miner_key, 10_240, now);
        let mut miner = Miner::new(candidate);
        loop {
            miner.run_chunk();
            if miner.is_finished() {
                break;
            }
        }
        let Some(MinerOutcome::Found(block)) = miner.outcome().cloned() else {
            anyhow::bail!("mining cancelled unexpectedly");
        };
        let parent = store.tip().clone();
        utxo = validate_block_connecting(&store, &parent, &block, utxo, 10_240, now + 1)?;
        let hash = block.hash();
        store.insert(block.clone())?;
        store.set_tip(hash)?;
        println!("block {i}: height={} hash={hash} difficulty={}", block.height, block.difficulty);
    }
    Ok(())
}
