//! Error types for the Brook protocol, one enum per failure domain.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("truncated input: need {need} more bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("bad DER signature header")]
    BadDerHeader,
    #[error("declared transaction size {declared} exceeds remaining {remaining} bytes")]
    OversizedDeclaration { declared: usize, remaining: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("block hash does not have {required} leading zero bits")]
    InsufficientWork { required: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContinuityError {
    #[error("bad height: expected {expected}, got {got}")]
    BadHeight { expected: u64, got: u64 },
    #[error("prev_hash does not match parent hash")]
    BadPrevHash,
    #[error("difficulty mismatch: expected {expected}, got {got}")]
    BadDifficulty { expected: u8, got: u8 },
    #[error("timestamp {timestamp} not after median time past {mtp}")]
    TimestampNotAfterMtp { timestamp: u64, mtp: u64 },
    #[error("timestamp {timestamp} too far in the future (now {now})")]
    TimestampTooFarFuture { timestamp: u64, now: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error("block transaction bytes {size} exceed max {max}")]
    BlockTooLarge { size: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("sum of inputs {sum_in} is less than sum of outputs {sum_out}")]
    InsufficientInputs { sum_in: u64, sum_out: u64 },
    #[error("fee {fee} below minimum {min} for {bytes} bytes")]
    FeeBelowMinimum { fee: u64, min: u64, bytes: usize },
    #[error("input {index} is unsigned")]
    UnsignedInput { index: usize },
    #[error("input {index} has an invalid signature")]
    InvalidSignature { index: usize },
    #[error("transaction has no inputs or no outputs")]
    EmptyInputsOrOutputs,
    #[error("input already claimed by another pending transaction")]
    AlreadyClaimed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinbaseError {
    #[error("coinbase must have exactly one input, got {0}")]
    WrongInputCount(usize),
    #[error("coinbase must have exactly one output, got {0}")]
    WrongOutputCount(usize),
    #[error("coinbase input prev_index {got} does not equal block height {expected}")]
    BadHeightMarker { expected: u64, got: u64 },
    #[error("coinbase reward {got} exceeds subsidy+fees {max}")]
    RewardTooHigh { got: u64, max: u64 },
    #[error("block has no coinbase transaction")]
    Missing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorgError {
    #[error("incoming branch has insufficient cumulative work: {incoming} < {local}")]
    InsufficientWork { incoming: u128, local: u128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InsufficientError {
    #[error("insufficient balance: have {have}, need {need}")]
    Balance { have: u64, need: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed JSON frame: {0}")]
    MalformedJson(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("self-connection detected")]
    SelfConnect,
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("request timed out after {millis}ms")]
    RequestTimeout { millis: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("empty chain")]
    EmptyChain,
    #[error("duplicate block: {0}")]
    DuplicateBlock(String),
}

/// Unified error type funnelling every domain error, the way `RillError`
/// does in the teacher codebase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrookError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Continuity(#[from] ContinuityError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error(transparent)]
    Coinbase(#[from] CoinbaseError),
    #[error(transparent)]
    Reorg(#[from] ReorgError),
    #[error(transparent)]
    Insufficient(#[from] InsufficientError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}
