//! Fixed-width binary codec for transactions and blocks (§4.A, §6).
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! TxInput   (108 B): prev_txid(32) | prev_index(4) | signature(72)
//! TxOutput  ( 73 B): amount(8)     | public_key(65)
//! Transaction:       input_count(4) | inputs... | output_count(4) | outputs...
//! Block:             height(8) | timestamp(8) | prev_hash(32) | difficulty(1)
//!                    | nonce(32) | txs...
//! ```
//!
//! A block carries no transaction count: the block's own byte length
//! delimits the trailing transaction concatenation, so `deserialize_many_transactions`
//! parses back-to-back transactions until the buffer is exhausted.

use crate::constants::{PUBLIC_KEY_BYTES, SIGNATURE_BYTES, TX_INPUT_BYTES, TX_OUTPUT_BYTES};
use crate::error::CodecError;
use crate::types::{Block, Hash256, PublicKeyBytes, SignatureSlot, Transaction, TxInput, TxOutput};

fn need(have: usize, need: usize) -> Result<(), CodecError> {
    if have < need {
        Err(CodecError::Truncated {
            need: need - have,
            have,
        })
    } else {
        Ok(())
    }
}

pub fn encode_tx_input(input: &TxInput) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TX_INPUT_BYTES);
    buf.extend_from_slice(input.prev_txid.as_bytes());
    buf.extend_from_slice(&input.prev_index.to_be_bytes());
    buf.extend_from_slice(&input.signature.0);
    buf
}

pub fn decode_tx_input(buf: &[u8]) -> Result<TxInput, CodecError> {
    need(buf.len(), TX_INPUT_BYTES)?;
    let prev_txid = Hash256::from_bytes(buf[0..32].try_into().unwrap());
    let prev_index = u32::from_be_bytes(buf[32..36].try_into().unwrap());
    let mut sig = [0u8; SIGNATURE_BYTES];
    sig.copy_from_slice(&buf[36..36 + SIGNATURE_BYTES]);
    Ok(TxInput {
        prev_txid,
        prev_index,
        signature: SignatureSlot(sig),
    })
}

pub fn encode_tx_output(output: &TxOutput) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TX_OUTPUT_BYTES);
    buf.extend_from_slice(&output.amount.to_be_bytes());
    buf.extend_from_slice(&output.public_key.0);
    buf
}

pub fn decode_tx_output(buf: &[u8]) -> Result<TxOutput, CodecError> {
    need(buf.len(), TX_OUTPUT_BYTES)?;
    let amount = u64::from_be_bytes(buf[0..8].try_into().unwrap());
    let mut key = [0u8; PUBLIC_KEY_BYTES];
    key.copy_from_slice(&buf[8..8 + PUBLIC_KEY_BYTES]);
    Ok(TxOutput {
        amount,
        public_key: PublicKeyBytes(key),
    })
}

/// Full transaction encoding, signatures included: both counts up
/// front, then all inputs, then all outputs (§6).
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tx.bytes_length());
    buf.extend_from_slice(&(tx.inputs.len() as u32).to_be_bytes());
    buf.extend_from_slice(&(tx.outputs.len() as u32).to_be_bytes());
    for input in &tx.inputs {
        buf.extend_from_slice(&encode_tx_input(input));
    }
    for output in &tx.outputs {
        buf.extend_from_slice(&encode_tx_output(output));
    }
    buf
}

/// Transaction encoding with every input's signature slot zeroed: this is
/// the byte string whose hash defines the txid and the signing message.
pub fn encode_transaction_unsigned(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tx.bytes_length());
    buf.extend_from_slice(&(tx.inputs.len() as u32).to_be_bytes());
    buf.extend_from_slice(&(tx.outputs.len() as u32).to_be_bytes());
    for input in &tx.inputs {
        buf.extend_from_slice(input.prev_txid.as_bytes());
        buf.extend_from_slice(&input.prev_index.to_be_bytes());
    }
    for output in &tx.outputs {
        buf.extend_from_slice(&encode_tx_output(output));
    }
    buf
}

pub fn decode_transaction(buf: &[u8]) -> Result<(Transaction, usize), CodecError> {
    need(buf.len(), 8)?;
    let input_count = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
    let output_count = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
    let mut offset = 8;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        need(buf.len(), offset + TX_INPUT_BYTES)?;
        inputs.push(decode_tx_input(&buf[offset..offset + TX_INPUT_BYTES])?);
        offset += TX_INPUT_BYTES;
    }
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        need(buf.len(), offset + TX_OUTPUT_BYTES)?;
        outputs.push(decode_tx_output(&buf[offset..offset + TX_OUTPUT_BYTES])?);
        offset += TX_OUTPUT_BYTES;
    }
    Ok((Transaction { inputs, outputs }, offset))
}

/// Decode back-to-back transactions from the front of `buf` until every
/// byte has been consumed, returning the transactions in order.
pub fn deserialize_many_transactions(buf: &[u8]) -> Result<Vec<Transaction>, CodecError> {
    let mut offset = 0;
    let mut txs = Vec::new();
    while offset < buf.len() {
        let (tx, used) = decode_transaction(&buf[offset..])?;
        offset += used;
        txs.push(tx);
    }
    Ok(txs)
}

pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&block.height.to_be_bytes());
    buf.extend_from_slice(&block.timestamp.to_be_bytes());
    buf.extend_from_slice(block.prev_hash.as_bytes());
    buf.push(block.difficulty);
    buf.extend_from_slice(&block.nonce);
    for tx in &block.txs {
        buf.extend_from_slice(&encode_transaction(tx));
    }
    buf
}

pub fn decode_block(buf: &[u8]) -> Result<Block, CodecError> {
    need(buf.len(), crate::constants::BLOCK_HEADER_BYTES)?;
    let height = u64::from_be_bytes(buf[0..8].try_into().unwrap());
    let timestamp = u64::from_be_bytes(buf[8..16].try_into().unwrap());
    let prev_hash = Hash256::from_bytes(buf[16..48].try_into().unwrap());
    let difficulty = buf[48];
    let mut nonce = [0u8; 32];
    nonce.copy_from_slice(&buf[49..81]);
    let txs = deserialize_many_transactions(&buf[81..])?;
    Ok(Block {
        height,
        timestamp,
        prev_hash,
        difficulty,
        nonce,
        txs,
    })
}
