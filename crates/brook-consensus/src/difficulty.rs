//! Difficulty retargeting and median-time-past (§4.F.1, §4.F.2).

use brook_core::chain_store::ChainStore;
use brook_core::constants::{ADJUST_EVERY, EXPECTED_WINDOW_MS, MAX_DIFFICULTY, MIN_DIFFICULTY};
use brook_core::types::Block;

/// The difficulty required of a block extending `parent`.
///
/// Retargets every [`ADJUST_EVERY`] blocks by comparing the time taken
/// to produce the last window against [`EXPECTED_WINDOW_MS`].
pub fn expected_difficulty(store: &ChainStore, parent: &Block) -> u8 {
    if parent.height % ADJUST_EVERY != 0 || parent.height == 0 {
        return parent.difficulty;
    }
    let window_start = store.ancestors(&parent.hash(), (ADJUST_EVERY + 1) as usize);
    let Some(anchor) = window_start.last() else {
        return parent.difficulty;
    };
    let duration = parent.timestamp.saturating_sub(anchor.timestamp);
    if duration < EXPECTED_WINDOW_MS / 2 {
        (parent.difficulty + 1).min(MAX_DIFFICULTY)
    } else if duration > EXPECTED_WINDOW_MS * 2 {
        parent.difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
    } else {
        parent.difficulty
    }
}

/// Median time past: the timestamp of the 5th ancestor of `block`, the
/// middle of an inclusive 11-block window.
pub fn median_time_past(store: &ChainStore, block: &Block) -> u64 {
    use brook_core::constants::MTP_OFFSET;
    let window = store.ancestors(&block.hash(), (MTP_OFFSET + 1) as usize);
    window.last().map(|b| b.timestamp).unwrap_or(block.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brook_core::genesis::genesis_block;
    use brook_core::reward::subsidy_at;
    use brook_core::types::{build_coinbase, PublicKeyBytes};

    fn extend(store: &mut ChainStore, spacing_ms: u64, difficulty_override: Option<u8>) -> Block {
        let parent = store.tip().clone();
        let difficulty = difficulty_override.unwrap_or_else(|| expected_difficulty(store, &parent));
        let coinbase = build_coinbase(
            PublicKeyBytes([3; 65]),
            subsidy_at(parent.height + 1),
            parent.height + 1,
            b"m",
        );
        let block = Block {
            height: parent.height + 1,
            timestamp: parent.timestamp + spacing_ms,
            prev_hash: parent.hash(),
            difficulty,
            nonce: [0u8; 32],
            txs: vec![coinbase],
        };
        let hash = block.hash();
        store.insert(block.clone()).unwrap();
        store.set_tip(hash).unwrap();
        block
    }

    #[test]
    fn no_retarget_before_interval() {
        let mut store = ChainStore::new();
        for _ in 0..3 {
            extend(&mut store, 10_000, None);
        }
        let parent = store.tip().clone();
        assert_eq!(expected_difficulty(&store, &parent), genesis_block().difficulty);
    }

    #[test]
    fn retargets_up_when_blocks_come_fast() {
        let mut store = ChainStore::new();
        for _ in 0..10 {
            extend(&mut store, 1_000, None);
        }
        let parent = store.tip().clone();
        assert_eq!(expected_difficulty(&store, &parent), parent.difficulty + 1);
    }

    #[test]
    fn retargets_down_when_blocks_come_slow() {
        let mut store = ChainStore::new();
        for _ in 0..10 {
            extend(&mut store, 50_000, Some(5));
        }
        let parent = store.tip().clone();
        assert_eq!(expected_difficulty(&store, &parent), parent.difficulty - 1);
    }

    #[test]
    fn holds_steady_within_band() {
        let mut store = ChainStore::new();
        for _ in 0..10 {
            extend(&mut store, 10_000, Some(3));
        }
        let parent = store.tip().clone();
        assert_eq!(expected_difficulty(&store, &parent), parent.difficulty);
    }
}
