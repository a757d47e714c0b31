//! The pending-transaction pool (§4.G): fee-descending ordering and a
//! spent-outpoint conflict set so two pending transactions can never
//! claim the same UTXO.

use std::collections::HashMap;

use crate::error::TxError;
use crate::types::{Hash256, Transaction};
use crate::utxo::UtxoSet;

#[derive(Clone, Debug)]
struct Entry {
    tx: Transaction,
    fee: u64,
}

/// Outstanding transactions not yet included in a block.
#[derive(Clone, Debug, Default)]
pub struct Mempool {
    entries: HashMap<Hash256, Entry>,
    /// Outpoints already claimed by a pending transaction.
    claimed: std::collections::HashSet<(Hash256, u32)>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transaction with its already-computed fee, rejecting it
    /// if any input is already claimed by a different pending
    /// transaction.
    pub fn insert(&mut self, tx: Transaction, fee: u64) -> Result<(), TxError> {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return Ok(());
        }
        for input in &tx.inputs {
            if self.claimed.contains(&(input.prev_txid, input.prev_index)) {
                return Err(TxError::AlreadyClaimed);
            }
        }
        for input in &tx.inputs {
            self.claimed.insert((input.prev_txid, input.prev_index));
        }
        self.entries.insert(txid, Entry { tx, fee });
        Ok(())
    }

    pub fn remove(&mut self, txid: &Hash256) -> Option<Transaction> {
        let entry = self.entries.remove(txid)?;
        for input in &entry.tx.inputs {
            self.claimed.remove(&(input.prev_txid, input.prev_index));
        }
        Some(entry.tx)
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash256) -> Option<&Transaction> {
        self.entries.get(txid).map(|e| &e.tx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every transaction that a newly connected block already
    /// included, along with anything left behind that now conflicts
    /// with the block's spends (double-spends resolved in the block's
    /// favor).
    pub fn drop_confirmed_and_conflicting(&mut self, block_txs: &[Transaction]) {
        for tx in block_txs {
            self.remove(&tx.txid());
        }
        let spent: std::collections::HashSet<_> = block_txs
            .iter()
            .flat_map(|tx| tx.inputs.iter().map(|i| (i.prev_txid, i.prev_index)))
            .collect();
        let conflicting: Vec<Hash256> = self
            .entries
            .values()
            .filter(|e| {
                e.tx
                    .inputs
                    .iter()
                    .any(|i| spent.contains(&(i.prev_txid, i.prev_index)))
            })
            .map(|e| e.tx.txid())
            .collect();
        for txid in conflicting {
            self.remove(&txid);
        }
    }

    /// Transactions ordered by total fee descending, the order a block
    /// producer should pull from when filling a block up to its byte
    /// budget.
    pub fn order_by_fees_desc(&self) -> Vec<(&Transaction, u64)> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.fee.cmp(&a.fee));
        entries.into_iter().map(|e| (&e.tx, e.fee)).collect()
    }

    /// Drop every pending transaction with an input no longer present
    /// in `utxo` (§4.G, §4.J.1 step 7): a reorg rollback can remove the
    /// block that created an output a pending transaction still claims,
    /// and such transactions must not linger claiming a vanished
    /// outpoint.
    pub fn drop_orphaned_by_missing_inputs(&mut self, utxo: &UtxoSet) {
        let orphaned: Vec<Hash256> = self
            .entries
            .values()
            .filter(|e| {
                e.tx
                    .inputs
                    .iter()
                    .any(|i| !utxo.contains(&i.prev_txid, i.prev_index))
            })
            .map(|e| e.tx.txid())
            .collect();
        for txid in orphaned {
            self.remove(&txid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PUBLIC_KEY_BYTES;
    use crate::types::{PublicKeyBytes, SignatureSlot, TxInput, TxOutput};

    fn tx_spending(prev: u8, amount: u64) -> Transaction {
        Transaction {
            inputs: vec![TxInput {
                prev_txid: Hash256([prev; 32]),
                prev_index: 0,
                signature: SignatureSlot::EMPTY,
            }],
            outputs: vec![TxOutput {
                amount,
                public_key: PublicKeyBytes([1; PUBLIC_KEY_BYTES]),
            }],
        }
    }

    #[test]
    fn insert_and_remove() {
        let mut pool = Mempool::new();
        let tx = tx_spending(1, 10);
        let txid = tx.txid();
        pool.insert(tx.clone(), 5).unwrap();
        assert!(pool.contains(&txid));
        assert_eq!(pool.remove(&txid), Some(tx));
        assert!(pool.is_empty());
    }

    #[test]
    fn rejects_conflicting_spend() {
        let mut pool = Mempool::new();
        pool.insert(tx_spending(1, 10), 5).unwrap();
        let conflict = tx_spending(1, 20);
        assert_eq!(pool.insert(conflict, 3), Err(TxError::AlreadyClaimed));
    }

    #[test]
    fn fees_descending_order() {
        let mut pool = Mempool::new();
        let cheap = tx_spending(1, 10);
        let rich = tx_spending(2, 10);
        pool.insert(cheap.clone(), 1).unwrap();
        pool.insert(rich.clone(), 100).unwrap();
        let ordered = pool.order_by_fees_desc();
        assert_eq!(ordered[0].0.txid(), rich.txid());
        assert_eq!(ordered[0].1, 100);
        assert_eq!(ordered[1].0.txid(), cheap.txid());
        assert_eq!(ordered[1].1, 1);
    }

    #[test]
    fn drops_transactions_orphaned_by_vanished_inputs() {
        let mut pool = Mempool::new();
        let tx = tx_spending(1, 10);
        let txid = tx.txid();
        pool.insert(tx, 5).unwrap();

        // the outpoint it spends is absent from the live UTXO set,
        // as it would be after a reorg rolled back the block that
        // created it.
        let utxo = crate::utxo::UtxoSet::new();
        pool.drop_orphaned_by_missing_inputs(&utxo);
        assert!(!pool.contains(&txid));
        assert!(pool.is_empty());
    }

    #[test]
    fn confirming_block_clears_conflicts() {
        let mut pool = Mempool::new();
        let tx = tx_spending(1, 10);
        let other_spender = tx_spending(1, 99);
        pool.insert(tx.clone(), 5).unwrap();
        assert!(pool.insert(other_spender, 5).is_err());
        pool.drop_confirmed_and_conflicting(&[tx.clone()]);
        assert!(pool.is_empty());
        assert!(!pool.claimed.contains(&(Hash256([1; 32]), 0)));
    }
}
