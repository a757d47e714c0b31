//! Core protocol types: hashes, keys, transactions, blocks, UTXOs.
//!
//! All monetary values are in sats (the smallest unit). All binary layouts
//! are fixed-width big-endian; see [`crate::codec`] for the exact byte
//! layout of each type.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{PUBLIC_KEY_BYTES, SIGNATURE_BYTES};

/// A 32-byte SHA-256 digest. Hex form is lowercase, unpadded, 64 chars.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// SHA-256 over arbitrary bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Count of leading zero bits, MSB-first, across the 32-byte digest.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0u32;
        for byte in &self.0 {
            if *byte == 0 {
                count += 8;
                continue;
            }
            count += byte.leading_zeros();
            break;
        }
        count
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Uncompressed secp256k1 public key (65 bytes, leading `0x04`).
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct PublicKeyBytes(#[serde(with = "serde_bytes_array")] pub [u8; PUBLIC_KEY_BYTES]);

impl PublicKeyBytes {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; PUBLIC_KEY_BYTES] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl PartialEq for PublicKeyBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}
impl Eq for PublicKeyBytes {}

impl std::hash::Hash for PublicKeyBytes {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({})", self.to_hex())
    }
}

/// A zero-padded DER signature slot (72 bytes on the wire).
///
/// The effective DER content is recovered from the header: byte 1 is the
/// declared content length, so `effective = &bytes[..2 + len]`.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct SignatureSlot(#[serde(with = "serde_bytes_array_72")] pub [u8; SIGNATURE_BYTES]);

impl SignatureSlot {
    pub const EMPTY: Self = Self([0u8; SIGNATURE_BYTES]);

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; SIGNATURE_BYTES]
    }

    /// Slice of the slot up through the declared DER content length,
    /// per the wire contract in §3/§6. Returns `None` if the header is
    /// malformed (not a `0x30` SEQUENCE tag, or declared length overruns
    /// the 72-byte slot).
    pub fn effective_der(&self) -> Option<&[u8]> {
        if self.0[0] != 0x30 {
            return None;
        }
        let len = self.0[1] as usize;
        let total = 2 + len;
        if total > SIGNATURE_BYTES {
            return None;
        }
        Some(&self.0[..total])
    }

    /// Pad a DER-encoded signature (or arbitrary coinbase message bytes)
    /// into a 72-byte slot, right-zero-padded.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        if der.len() > SIGNATURE_BYTES {
            return None;
        }
        let mut buf = [0u8; SIGNATURE_BYTES];
        buf[..der.len()].copy_from_slice(der);
        Some(Self(buf))
    }

    /// Pad arbitrary bytes (e.g. a coinbase message) into the slot,
    /// truncating to 72 bytes if longer.
    pub fn from_message(msg: &[u8]) -> Self {
        let mut buf = [0u8; SIGNATURE_BYTES];
        let n = msg.len().min(SIGNATURE_BYTES);
        buf[..n].copy_from_slice(&msg[..n]);
        Self(buf)
    }
}

impl PartialEq for SignatureSlot {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}
impl Eq for SignatureSlot {}

impl fmt::Debug for SignatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureSlot({})", hex::encode(self.0))
    }
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 65], s: S) -> Result<S::Ok, S::Error> {
        bytes.to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 65], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected 65 bytes"))
    }
}

mod serde_bytes_array_72 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 72], s: S) -> Result<S::Ok, S::Error> {
        bytes.to_vec().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 72], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected 72 bytes"))
    }
}

/// A transaction input (108 bytes on the wire).
///
/// For a coinbase input, `prev_index` carries the block height and the
/// `signature` slot carries the miner-chosen coinbase message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_txid: Hash256,
    pub prev_index: u32,
    pub signature: SignatureSlot,
}

/// A transaction output (73 bytes on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub public_key: PublicKeyBytes,
}

/// A transaction transferring value between public keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// `txid = SHA-256(serialize_unsigned(tx))`: inputs omit their
    /// signature so that signing is defined over the txid itself.
    pub fn txid(&self) -> Hash256 {
        Hash256::of(&crate::codec::encode_transaction_unsigned(self))
    }

    /// A coinbase transaction has exactly one input with a null previous
    /// txid (the block-height marker lives in `prev_index`).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_txid.is_zero()
    }

    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// `8 + 108 * inputs + 73 * outputs` per the wire format.
    pub fn bytes_length(&self) -> usize {
        8 + crate::constants::TX_INPUT_BYTES * self.inputs.len()
            + crate::constants::TX_OUTPUT_BYTES * self.outputs.len()
    }
}

/// Construct the coinbase transaction for a mined block.
///
/// `prev_index` is set to `height`; the signature slot carries the
/// miner-chosen coinbase message, zero-padded.
pub fn build_coinbase(
    to_pubkey: PublicKeyBytes,
    reward: u64,
    height: u64,
    message: &[u8],
) -> Transaction {
    Transaction {
        inputs: vec![TxInput {
            prev_txid: Hash256::ZERO,
            prev_index: height as u32,
            signature: SignatureSlot::from_message(message),
        }],
        outputs: vec![TxOutput {
            amount: reward,
            public_key: to_pubkey,
        }],
    }
}

/// A full block: fixed header fields plus the serialized transactions,
/// the first of which must be the coinbase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: u64,
    pub prev_hash: Hash256,
    pub difficulty: u8,
    pub nonce: [u8; 32],
    pub txs: Vec<Transaction>,
}

impl Block {
    /// The block hash is SHA-256 over the entire serialized block,
    /// including the nonce and all transactions.
    pub fn hash(&self) -> Hash256 {
        Hash256::of(&crate::codec::encode_block(self))
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.txs.first()
    }

    /// Total serialized bytes of all transactions in the block.
    pub fn total_tx_bytes(&self) -> usize {
        self.txs.iter().map(|t| t.bytes_length()).sum()
    }

    /// Whether this block's own proof-of-work satisfies its declared
    /// difficulty: the first `difficulty` bits of `hash(block)` are zero.
    pub fn satisfies_own_pow(&self) -> bool {
        self.hash().leading_zero_bits() >= self.difficulty as u32
    }

    /// Cumulative work contributed by this single block: `2^difficulty`.
    pub fn work(&self) -> u128 {
        1u128 << self.difficulty
    }
}

/// An entry in the unspent transaction output set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTxOut {
    pub block_hash: Hash256,
    pub txid: Hash256,
    pub index: u32,
    pub output: TxOutput,
}

impl UTxOut {
    pub fn from_block(block_hash: Hash256, txid: Hash256, index: u32, output: TxOutput) -> Self {
        Self {
            block_hash,
            txid,
            index,
            output,
        }
    }

    pub fn key(&self) -> (String, u32) {
        (self.txid.to_hex(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pubkey() -> PublicKeyBytes {
        PublicKeyBytes([0xAA; PUBLIC_KEY_BYTES])
    }

    fn sample_tx() -> Transaction {
        Transaction {
            inputs: vec![TxInput {
                prev_txid: Hash256([0x11; 32]),
                prev_index: 0,
                signature: SignatureSlot::EMPTY,
            }],
            outputs: vec![TxOutput {
                amount: 50,
                public_key: sample_pubkey(),
            }],
        }
    }

    #[test]
    fn hash256_display_is_lowercase_hex() {
        let h = Hash256([0xAB; 32]);
        let s = format!("{h}");
        assert_eq!(s.len(), 64);
        assert_eq!(&s[0..2], "ab");
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash256_leading_zero_bits() {
        assert_eq!(Hash256::ZERO.leading_zero_bits(), 256);
        assert_eq!(Hash256([0x80; 32]).leading_zero_bits(), 0);
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        assert_eq!(Hash256(bytes).leading_zero_bits(), 7);
    }

    #[test]
    fn leading_zero_bits_mixed() {
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x0f;
        let h = Hash256(bytes);
        assert_eq!(h.leading_zero_bits(), 8 + 4);
    }

    #[test]
    fn txid_excludes_signature() {
        let tx1 = sample_tx();
        let mut tx2 = tx1.clone();
        tx2.inputs[0].signature = SignatureSlot::from_message(b"anything");
        assert_eq!(tx1.txid(), tx2.txid());
    }

    #[test]
    fn txid_changes_with_outputs() {
        let tx1 = sample_tx();
        let mut tx2 = tx1.clone();
        tx2.outputs[0].amount = 49;
        assert_ne!(tx1.txid(), tx2.txid());
    }

    #[test]
    fn coinbase_detection() {
        let cb = build_coinbase(sample_pubkey(), 100, 5, b"msg");
        assert!(cb.is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn bytes_length_formula() {
        let tx = sample_tx();
        assert_eq!(tx.bytes_length(), 8 + 108 + 73);
    }

    #[test]
    fn signature_slot_effective_der() {
        let der = [0x30u8, 0x06, 1, 2, 3, 4, 5, 6];
        let slot = SignatureSlot::from_der(&der).unwrap();
        assert_eq!(slot.effective_der(), Some(&der[..]));
    }

    #[test]
    fn signature_slot_bad_header() {
        let slot = SignatureSlot([0u8; 72]);
        assert!(slot.effective_der().is_none());
    }
}
