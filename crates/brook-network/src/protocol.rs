//! Wire message envelope and payload types for the Brook peer protocol
//! (§4.I): one WebSocket per peer, UTF-8 JSON text frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ "type": string, "id"?: number, "data": object }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub data: Value,
}

impl Envelope {
    pub fn request(kind: &str, id: u64, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            id: Some(id),
            data,
        }
    }

    pub fn notify(kind: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            id: None,
            data,
        }
    }

    pub fn response(id: u64, data: Value) -> Self {
        Self {
            kind: "response".to_string(),
            id: Some(id),
            data,
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("envelope always serializes")
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// `nodeinfo { nodeId, listenAddress? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub node_id: String,
    #[serde(default)]
    pub listen_address: Option<String>,
}

/// `blockinv { hash, height }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInv {
    pub hash: String,
    pub height: u64,
}

/// `getblock` takes one of two shapes: a set of explicit hashes, or a
/// frontier + batch size for backward gap-fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GetBlock {
    ByHashes { hash: Vec<String> },
    Frontier { frontier: String, batch: usize },
}

/// `txinv { txids }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInv {
    pub txids: Vec<String>,
}

/// `gettx { txids? }`. Missing `txids` means "send me everything
/// pending".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTx {
    #[serde(default)]
    pub txids: Option<Vec<String>>,
}

/// `getpeers` has no payload fields; its response carries advertised
/// addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPeers {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxsResponse {
    pub txs: Vec<String>,
}

pub const TYPE_NODEINFO: &str = "nodeinfo";
pub const TYPE_BLOCKINV: &str = "blockinv";
pub const TYPE_GETBLOCK: &str = "getblock";
pub const TYPE_TXINV: &str = "txinv";
pub const TYPE_GETTX: &str = "gettx";
pub const TYPE_GETPEERS: &str = "getpeers";
pub const TYPE_RESPONSE: &str = "response";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let env = Envelope::request(TYPE_GETBLOCK, 7, serde_json::json!({"hash": ["abc"]}));
        let text = env.to_text();
        let back = Envelope::from_text(&text).unwrap();
        assert_eq!(back.kind, TYPE_GETBLOCK);
        assert_eq!(back.id, Some(7));
    }

    #[test]
    fn notify_has_no_id() {
        let env = Envelope::notify(TYPE_BLOCKINV, serde_json::json!({"hash": "x", "height": 1}));
        let text = env.to_text();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn getblock_untagged_variants() {
        let by_hash: GetBlock = serde_json::from_value(serde_json::json!({"hash": ["a", "b"]})).unwrap();
        assert!(matches!(by_hash, GetBlock::ByHashes { .. }));
        let frontier: GetBlock =
            serde_json::from_value(serde_json::json!({"frontier": "a", "batch": 2})).unwrap();
        assert!(matches!(frontier, GetBlock::Frontier { .. }));
    }
}
