//! The cooperative proof-of-work miner (§4.H): a small state machine
//! that searches nonces in bounded chunks so a single-threaded executor
//! keeps making progress elsewhere between searches.

use rand::RngCore;

use brook_core::chain_store::ChainStore;
use brook_core::constants::MINER_CHUNK_TRIALS;
use brook_core::mempool::Mempool;
use brook_core::reward::subsidy_at;
use brook_core::types::{build_coinbase, Block, PublicKeyBytes};

use crate::difficulty::expected_difficulty;

/// Build a candidate block atop the current tip: coinbase first, then
/// mempool transactions pulled in fee-descending order up to the block
/// byte budget, per §4.H's candidate selection algorithm.
pub fn build_candidate(
    store: &ChainStore,
    mempool: &Mempool,
    miner_key: PublicKeyBytes,
    max_block_bytes: usize,
    now_ms: u64,
) -> Block {
    let parent = store.tip();
    let height = parent.height + 1;
    let difficulty = expected_difficulty(store, parent);

    let mut selected = Vec::new();
    let mut bytes_so_far = 0usize;
    let mut total_fees = 0u64;
    for (tx, fee) in mempool.order_by_fees_desc() {
        let tx_bytes = tx.bytes_length();
        if bytes_so_far + tx_bytes > max_block_bytes {
            continue;
        }
        bytes_so_far += tx_bytes;
        total_fees += fee;
        selected.push(tx.clone());
    }

    let coinbase = build_coinbase(
        miner_key,
        subsidy_at(height) + total_fees,
        height,
        b"mined by brook",
    );

    let mut txs = Vec::with_capacity(selected.len() + 1);
    txs.push(coinbase);
    txs.extend(selected);

    Block {
        height,
        timestamp: now_ms,
        prev_hash: parent.hash(),
        difficulty,
        nonce: [0u8; 32],
        txs,
    }
}

/// Terminal outcome of a miner run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MinerOutcome {
    Found(Block),
    Cancelled,
}

/// Internal miner state.
#[derive(Debug, PartialEq, Eq)]
enum State {
    Searching,
    Finished(MinerOutcome),
}

/// A cooperative nonce search over a single candidate block.
///
/// Call [`Miner::run_chunk`] repeatedly (yielding control to the
/// executor between calls) until [`Miner::is_finished`] is true, or call
/// [`Miner::cancel`] to stop early. Both paths reach exactly one
/// terminal outcome.
pub struct Miner {
    candidate: Block,
    state: State,
    cancelled: bool,
}

impl Miner {
    pub fn new(candidate: Block) -> Self {
        Self {
            candidate,
            state: State::Searching,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished(_))
    }

    /// Consume the terminal outcome, if reached. Idempotent: once
    /// consumed it keeps returning the same outcome on subsequent calls.
    pub fn outcome(&self) -> Option<&MinerOutcome> {
        match &self.state {
            State::Finished(outcome) => Some(outcome),
            State::Searching => None,
        }
    }

    /// Run up to [`MINER_CHUNK_TRIALS`] nonce attempts, then return.
    /// Checks for cancellation both before and after the chunk so a
    /// `cancel()` observed between chunks always wins.
    pub fn run_chunk(&mut self) {
        if self.is_finished() {
            return;
        }
        if self.cancelled {
            self.state = State::Finished(MinerOutcome::Cancelled);
            return;
        }
        let mut rng = rand::thread_rng();
        for _ in 0..MINER_CHUNK_TRIALS {
            let mut nonce = [0u8; 32];
            rng.fill_bytes(&mut nonce);
            self.candidate.nonce = nonce;
            if self.candidate.satisfies_own_pow() {
                self.state = State::Finished(MinerOutcome::Found(self.candidate.clone()));
                return;
            }
        }
        if self.cancelled {
            self.state = State::Finished(MinerOutcome::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_core::genesis::genesis_block;

    fn trivial_candidate() -> Block {
        let mut block = genesis_block();
        block.height = 1;
        block.difficulty = 0;
        block.prev_hash = genesis_block().hash();
        block
    }

    #[test]
    fn miner_finds_zero_difficulty_immediately() {
        let mut miner = Miner::new(trivial_candidate());
        miner.run_chunk();
        assert!(miner.is_finished());
        assert!(matches!(miner.outcome(), Some(MinerOutcome::Found(_))));
    }

    #[test]
    fn cancel_before_chunk_yields_cancelled() {
        let mut miner = Miner::new(trivial_candidate());
        miner.cancel();
        miner.run_chunk();
        assert_eq!(miner.outcome(), Some(&MinerOutcome::Cancelled));
    }

    #[test]
    fn finished_miner_stays_finished() {
        let mut miner = Miner::new(trivial_candidate());
        miner.run_chunk();
        let first = miner.outcome().cloned();
        miner.run_chunk();
        assert_eq!(miner.outcome().cloned(), first);
    }

    #[test]
    fn build_candidate_extends_tip() {
        let store = ChainStore::new();
        let mempool = Mempool::new();
        let candidate = build_candidate(&store, &mempool, PublicKeyBytes([2; 65]), 10_240, 1_700_000_000_000);
        assert_eq!(candidate.height, store.tip().height + 1);
        assert_eq!(candidate.prev_hash, store.tip().hash());
        assert!(candidate.txs[0].is_coinbase());
    }
}
