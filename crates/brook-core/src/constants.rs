//! Protocol constants. All monetary values are in sats (smallest unit).

/// Fixed wire width of a `TxInput` (§3, §6).
pub const TX_INPUT_BYTES: usize = 108;
/// Fixed wire width of a `TxOutput` (§3, §6).
pub const TX_OUTPUT_BYTES: usize = 73;
/// Raw bytes of a public key (uncompressed secp256k1, leading `0x04`).
pub const PUBLIC_KEY_BYTES: usize = 65;
/// Wire width of a zero-padded DER signature slot.
pub const SIGNATURE_BYTES: usize = 72;
/// Minimum header width of a block with zero transactions.
pub const BLOCK_HEADER_BYTES: usize = 8 + 8 + 32 + 1 + 32;

/// Target spacing between blocks, in milliseconds.
pub const BLOCK_TARGET_MS: u64 = 10_000;
/// Retarget every this many blocks.
pub const ADJUST_EVERY: u64 = 10;
/// Expected duration of one retarget window, in milliseconds.
pub const EXPECTED_WINDOW_MS: u64 = BLOCK_TARGET_MS * ADJUST_EVERY;
/// Base mining subsidy at height 0, in sats.
pub const INITIAL_SUBSIDY: u64 = 5_000_000_000;
/// Subsidy halves every this many blocks.
pub const HALVING_INTERVAL: u64 = 210_000;
/// Window size (in blocks) used to compute the median time past.
pub const MTP_WINDOW: u64 = 11;
/// `MTP(block)` is the timestamp of this many blocks back from `block`.
pub const MTP_OFFSET: u64 = 5;
/// Maximum allowed drift of a block's timestamp into the future, in ms.
pub const MAX_FUTURE_DRIFT_MS: u64 = 120_000;
/// Minimum transaction fee rate, in sats per serialized byte.
pub const MIN_FEE_RATE: u64 = 1;
/// Default maximum total transaction bytes per block.
pub const DEFAULT_MAX_BLOCK_BYTES: usize = 10_240;
/// Minimum allowed difficulty (count of required leading zero bits).
pub const MIN_DIFFICULTY: u8 = 1;
/// Maximum allowed difficulty (count of required leading zero bits).
///
/// The wire format fixes difficulty to a single byte, so 256 (a 257-value
/// count) cannot be represented; 255 is the practical ceiling. See
/// DESIGN.md for the retarget-clamp note.
pub const MAX_DIFFICULTY: u8 = 255;

/// Broadcast fanout: number of peers a message is sent to.
pub const BROADCAST_FANOUT: usize = 8;
/// Request/response correlation timeout, in milliseconds.
pub const REQUEST_TIMEOUT_MS: u64 = 3_000;
/// Outbound connect-open deadline, in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 1_000;
/// Interval between peer-discovery refresh ticks, in milliseconds.
pub const PEER_REFRESH_MS: u64 = 60_000;
/// Minimum number of live peers the discovery loop tries to maintain.
pub const MIN_LIVE_PEERS: usize = 8;
/// Initial batch size for gap-fill backward block fetch.
pub const GAP_FILL_INITIAL_BATCH: usize = 2;
/// Maximum batch size for gap-fill backward block fetch.
pub const GAP_FILL_MAX_BATCH: usize = 2048;

/// Miner cooperative chunk size (nonce trials between yields).
pub const MINER_CHUNK_TRIALS: usize = 100;
