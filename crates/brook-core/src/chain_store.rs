//! In-memory block store (§4.E): blocks keyed by hash, a forward `next`
//! pointer per block to let the canonical chain be walked in either
//! direction, and the current tip.

use std::collections::HashMap;

use crate::error::ChainError;
use crate::genesis::genesis_block;
use crate::types::{Block, Hash256};

#[derive(Clone, Debug)]
struct StoredBlock {
    block: Block,
    /// Hash of the block that extends this one on the canonical chain,
    /// if any.
    next: Option<Hash256>,
}

/// All known blocks plus the canonical tip.
#[derive(Clone, Debug)]
pub struct ChainStore {
    blocks: HashMap<Hash256, StoredBlock>,
    tip: Hash256,
}

impl ChainStore {
    /// A store seeded with only the genesis block as tip.
    pub fn new() -> Self {
        let genesis = genesis_block();
        let hash = genesis.hash();
        let mut blocks = HashMap::new();
        blocks.insert(hash, StoredBlock { block: genesis, next: None });
        Self { blocks, tip: hash }
    }

    pub fn tip_hash(&self) -> Hash256 {
        self.tip
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[&self.tip].block
    }

    pub fn get(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.get(hash).map(|s| &s.block)
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn height(&self) -> u64 {
        self.tip().height
    }

    /// Insert a block that is not (yet) necessarily on the canonical
    /// chain; callers decide tip movement separately via
    /// [`ChainStore::set_tip`].
    pub fn insert(&mut self, block: Block) -> Result<(), ChainError> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash.to_hex()));
        }
        self.blocks.insert(hash, StoredBlock { block, next: None });
        Ok(())
    }

    /// Move the tip, relinking `next` pointers along the new canonical
    /// path back to the nearest ancestor shared with the old path. This
    /// is the one operation that actually performs a reorg at the
    /// storage layer; [`crate::chain_store::ChainStore`] does not itself
    /// decide whether the move should happen (see the consensus crate's
    /// cumulative-work comparison).
    pub fn set_tip(&mut self, new_tip: Hash256) -> Result<(), ChainError> {
        if !self.blocks.contains_key(&new_tip) {
            return Err(ChainError::BlockNotFound(new_tip.to_hex()));
        }
        let mut path = Vec::new();
        let mut cursor = new_tip;
        loop {
            path.push(cursor);
            let stored = &self.blocks[&cursor];
            if stored.block.prev_hash.is_zero() && stored.block.height == 0 {
                break;
            }
            cursor = stored.block.prev_hash;
        }
        for window in path.windows(2).rev() {
            let (child, parent) = (window[0], window[1]);
            self.blocks.get_mut(&parent).unwrap().next = Some(child);
        }
        if let Some(leaf) = path.first() {
            self.blocks.get_mut(leaf).unwrap().next = None;
        }
        self.tip = new_tip;
        Ok(())
    }

    /// Walk back `n` blocks from the tip along the canonical chain,
    /// returning the ancestor (clamped at genesis).
    pub fn ancestor_of_tip(&self, n: u64) -> &Block {
        let mut cursor = self.tip();
        for _ in 0..n {
            if cursor.height == 0 {
                break;
            }
            cursor = &self.blocks[&cursor.prev_hash].block;
        }
        cursor
    }

    /// The most recent `n` blocks of the canonical chain, newest first.
    pub fn top(&self, n: usize) -> Vec<&Block> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = Some(self.tip());
        while let Some(block) = cursor {
            if out.len() >= n {
                break;
            }
            out.push(block);
            cursor = if block.height == 0 {
                None
            } else {
                self.blocks.get(&block.prev_hash).map(|s| &s.block)
            };
        }
        out
    }

    /// Canonical-chain ancestors of `hash`, newest first, up to `n`.
    pub fn ancestors(&self, hash: &Hash256, n: usize) -> Vec<&Block> {
        let mut out = Vec::with_capacity(n.min(self.blocks.len()));
        let mut cursor = self.blocks.get(hash).map(|s| &s.block);
        while let Some(block) = cursor {
            if out.len() >= n {
                break;
            }
            out.push(block);
            cursor = if block.height == 0 {
                None
            } else {
                self.blocks.get(&block.prev_hash).map(|s| &s.block)
            };
        }
        out
    }

    pub fn cumulative_work(&self, hash: &Hash256) -> Option<u128> {
        let mut total = 0u128;
        let mut cursor = self.blocks.get(hash).map(|s| &s.block)?;
        loop {
            total += cursor.work();
            if cursor.height == 0 {
                break;
            }
            cursor = &self.blocks.get(&cursor.prev_hash)?.block;
        }
        Some(total)
    }

    /// The block that extends `hash` on the canonical chain, if any.
    pub fn next_of(&self, hash: &Hash256) -> Option<Hash256> {
        self.blocks.get(hash).and_then(|s| s.next)
    }

    /// Remove every block that extended `fork` on the old active chain
    /// (walking `next` pointers) and clear `fork`'s `next`, as part of
    /// committing a reorg. Returns the removed hashes, oldest first.
    pub fn prune_suffix_after(&mut self, fork: &Hash256) -> Vec<Hash256> {
        let mut removed = Vec::new();
        let mut cursor = self.blocks.get(fork).and_then(|s| s.next);
        if let Some(stored) = self.blocks.get_mut(fork) {
            stored.next = None;
        }
        while let Some(hash) = cursor {
            cursor = self.blocks.get(&hash).and_then(|s| s.next);
            self.blocks.remove(&hash);
            removed.push(hash);
        }
        removed
    }

    pub fn is_on_canonical_chain(&self, hash: &Hash256) -> bool {
        let mut cursor = self.tip;
        loop {
            if cursor == *hash {
                return true;
            }
            let stored = &self.blocks[&cursor];
            if stored.block.height == 0 {
                return false;
            }
            cursor = stored.block.prev_hash;
        }
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::build_coinbase;
    use crate::types::PublicKeyBytes;

    fn child_of(parent: &Block, difficulty: u8) -> Block {
        let coinbase = build_coinbase(
            PublicKeyBytes([9; 65]),
            crate::reward::subsidy_at(parent.height + 1),
            parent.height + 1,
            b"x",
        );
        Block {
            height: parent.height + 1,
            timestamp: parent.timestamp + 10_000,
            prev_hash: parent.hash(),
            difficulty,
            nonce: [0u8; 32],
            txs: vec![coinbase],
        }
    }

    #[test]
    fn new_store_has_genesis_as_tip() {
        let store = ChainStore::new();
        assert_eq!(store.height(), 0);
        assert_eq!(store.tip_hash(), genesis_block().hash());
    }

    #[test]
    fn insert_and_set_tip_extends_chain() {
        let mut store = ChainStore::new();
        let b1 = child_of(store.tip(), 1);
        let hash1 = b1.hash();
        store.insert(b1).unwrap();
        store.set_tip(hash1).unwrap();
        assert_eq!(store.height(), 1);
        assert_eq!(store.tip_hash(), hash1);
    }

    #[test]
    fn top_n_walks_backward() {
        let mut store = ChainStore::new();
        let b1 = child_of(store.tip(), 1);
        let h1 = b1.hash();
        store.insert(b1).unwrap();
        store.set_tip(h1).unwrap();
        let b2 = child_of(store.tip(), 1);
        let h2 = b2.hash();
        store.insert(b2).unwrap();
        store.set_tip(h2).unwrap();

        let top = store.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].hash(), h2);
        assert_eq!(top[1].hash(), h1);
    }

    #[test]
    fn cumulative_work_sums_powers_of_two() {
        let mut store = ChainStore::new();
        let b1 = child_of(store.tip(), 2);
        let h1 = b1.hash();
        store.insert(b1).unwrap();
        store.set_tip(h1).unwrap();
        let genesis_work = genesis_block().work();
        assert_eq!(store.cumulative_work(&h1).unwrap(), genesis_work + 4);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut store = ChainStore::new();
        let b1 = child_of(store.tip(), 1);
        store.insert(b1.clone()).unwrap();
        assert!(store.insert(b1).is_err());
    }
}
