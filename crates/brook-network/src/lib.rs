//! The JSON-over-WebSocket peer protocol: handshake, discovery,
//! broadcast, and the sync engine that ingests blocks and transactions.

pub mod discovery;
pub mod handshake;
pub mod listener;
pub mod peer;
pub mod peer_table;
pub mod protocol;
pub mod sync;

pub use peer::{Inbound, PeerHandle};
pub use peer_table::PeerTable;
pub use sync::{ChainState, SyncEngine};
