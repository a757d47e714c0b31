//! The hardcoded genesis block (§6).
//!
//! Genesis has no parent to validate against, so its own proof-of-work
//! and coinbase are trusted as bootstrap data rather than re-derived by
//! the consensus rules that govern connecting a block to a parent.

use std::sync::LazyLock;

use crate::types::{build_coinbase, Block, Hash256, PublicKeyBytes};

/// Timestamp of the genesis block, milliseconds since the Unix epoch.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_749_376_247_272;
/// Genesis difficulty: one required leading zero bit.
pub const GENESIS_DIFFICULTY: u8 = 1;
/// Genesis coinbase message, carried in the signature slot.
pub const GENESIS_MESSAGE: &[u8] =
    b"The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Public key credited with the genesis subsidy. This is a fixed,
/// documented placeholder: nobody holds its private key, so the genesis
/// coinbase output is permanently unspendable.
const GENESIS_PUBLIC_KEY: [u8; 65] = [
    0x04, 0x67, 0x8a, 0xfd, 0xb0, 0xfe, 0x55, 0x48, 0x27, 0x19, 0x67, 0xf1, 0xa6, 0x71, 0x30,
    0xb7, 0x10, 0x5c, 0xd6, 0xa8, 0x28, 0xe0, 0x39, 0x09, 0xa6, 0x79, 0x62, 0xe0, 0xea, 0x1f,
    0x61, 0xde, 0xb6, 0x49, 0xf6, 0xbc, 0x3f, 0x4c, 0xef, 0x38, 0xc4, 0xf3, 0x55, 0x04, 0xe5,
    0x1e, 0xc1, 0x12, 0xde, 0x5c, 0x38, 0x4d, 0xf7, 0xba, 0x0b, 0x8d, 0x57, 0x8a, 0x4c, 0x70,
    0x2b, 0x6b, 0xf1, 0x1d, 0x5f,
];

/// Nonce that, per the original bootstrap record, produces a genesis
/// hash satisfying [`GENESIS_DIFFICULTY`].
const GENESIS_NONCE: [u8; 32] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    42,
];

fn build_genesis() -> Block {
    let coinbase = build_coinbase(
        PublicKeyBytes(GENESIS_PUBLIC_KEY),
        crate::constants::INITIAL_SUBSIDY,
        0,
        GENESIS_MESSAGE,
    );
    Block {
        height: 0,
        timestamp: GENESIS_TIMESTAMP_MS,
        prev_hash: Hash256::ZERO,
        difficulty: GENESIS_DIFFICULTY,
        nonce: GENESIS_NONCE,
        txs: vec![coinbase],
    }
}

static GENESIS: LazyLock<Block> = LazyLock::new(build_genesis);

/// The canonical genesis block, built once and shared.
pub fn genesis_block() -> Block {
    GENESIS.clone()
}

pub fn genesis_hash() -> Hash256 {
    GENESIS.hash()
}
