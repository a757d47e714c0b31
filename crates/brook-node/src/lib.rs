//! Node wiring: configuration, the local wallet, the `Node` handle, and
//! the interactive shell.

pub mod config;
pub mod node;
pub mod shell;
pub mod wallet;

pub use config::NodeConfig;
pub use node::Node;
pub use wallet::Wallet;
