//! Connected-peer bookkeeping and the discovery address book (§4.I.2).

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::peer::PeerHandle;

/// All currently connected peers, keyed by remote address, plus the set
/// of known-but-unconnected addresses learned via `getpeers`.
#[derive(Default)]
pub struct PeerTable {
    connected: DashMap<String, PeerHandle>,
    known_addresses: Mutex<HashSet<String>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: PeerHandle) {
        self.connected.insert(peer.remote_addr().to_string(), peer);
    }

    pub fn remove(&self, remote_addr: &str) -> Option<PeerHandle> {
        self.connected.remove(remote_addr).map(|(_, v)| v)
    }

    pub fn is_connected(&self, remote_addr: &str) -> bool {
        self.connected.contains_key(remote_addr)
    }

    pub fn live_count(&self) -> usize {
        self.connected.len()
    }

    pub fn all(&self) -> Vec<PeerHandle> {
        self.connected.iter().map(|e| e.value().clone()).collect()
    }

    /// Known addresses advertised by connected peers, excluding `self_addr`
    /// (the requester's own address) and peers with no advertised address.
    pub fn advertised_addresses(&self, exclude: Option<&str>) -> Vec<String> {
        self.connected
            .iter()
            .filter_map(|e| e.value().listen_address())
            .filter(|addr| Some(addr.as_str()) != exclude)
            .collect()
    }

    pub fn remember_addresses(&self, addrs: impl IntoIterator<Item = String>) {
        let mut known = self.known_addresses.lock();
        for addr in addrs {
            known.insert(addr);
        }
    }

    /// Pop one address not already connected, for reconnection attempts.
    pub fn pop_unconnected_address(&self) -> Option<String> {
        let mut known = self.known_addresses.lock();
        let candidate = known.iter().find(|a| !self.is_connected(a)).cloned();
        if let Some(ref addr) = candidate {
            known.remove(addr);
        }
        candidate
    }

    pub fn known_address_count(&self) -> usize {
        self.known_addresses.lock().len()
    }

    /// `min(|peers|, n)` peers chosen uniformly without replacement, for
    /// broadcast fanout (§4.I.3).
    pub fn sample(&self, n: usize) -> Vec<PeerHandle> {
        let mut all = self.all();
        if all.len() <= n {
            return all;
        }
        let mut rng = rand::thread_rng();
        all.shuffle(&mut rng);
        all.truncate(n);
        all
    }

    /// A few random live peers, for the periodic discovery refresh.
    pub fn random_live(&self, n: usize) -> Vec<PeerHandle> {
        self.sample(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_peer(addr: &str) -> PeerHandle {
        // PeerHandle construction requires an outbound channel; tests
        // build one with a detached receiver since no I/O happens here.
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        crate::peer::PeerHandle::for_test(addr.to_string(), tx)
    }

    #[test]
    fn sample_returns_all_when_fewer_than_n() {
        let table = PeerTable::new();
        table.insert(dummy_peer("a:1"));
        table.insert(dummy_peer("b:2"));
        assert_eq!(table.sample(8).len(), 2);
    }

    #[test]
    fn sample_caps_at_n() {
        let table = PeerTable::new();
        for i in 0..10 {
            table.insert(dummy_peer(&format!("peer:{i}")));
        }
        assert_eq!(table.sample(8).len(), 8);
    }

    #[test]
    fn known_addresses_pop_skips_connected() {
        let table = PeerTable::new();
        table.insert(dummy_peer("a:1"));
        table.remember_addresses(["a:1".to_string(), "b:2".to_string()]);
        let popped = table.pop_unconnected_address();
        assert_eq!(popped, Some("b:2".to_string()));
    }

    #[test]
    fn advertised_addresses_excludes_requester() {
        let table = PeerTable::new();
        let p1 = dummy_peer("a:1");
        p1.set_listen_address(Some("a:1".to_string()));
        let p2 = dummy_peer("b:2");
        p2.set_listen_address(Some("b:2".to_string()));
        table.insert(p1);
        table.insert(p2);
        let addrs = table.advertised_addresses(Some("a:1"));
        assert_eq!(addrs, vec!["b:2".to_string()]);
    }
}
