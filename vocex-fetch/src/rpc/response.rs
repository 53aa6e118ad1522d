//! Response types for the node JSON-RPC client.
//!
//! Only the fields the explorer consumes are modelled; everything else the node sends is
//! ignored.

pub mod common;

use common::{base64_bytes, base64_list, hex_bytes, stringified};

/// Response to a `status` RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StatusResponse {
    /// Information about the node itself.
    pub node_info: NodeInfo,
    /// Sync progress of the node.
    pub sync_info: SyncInfo,
}

/// Node identity, as reported by `status`.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct NodeInfo {
    /// Chain identifier.
    pub network: String,
    /// Node software version.
    pub version: String,
    /// Node moniker.
    pub moniker: String,
}

/// Node sync progress, as reported by `status`.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SyncInfo {
    /// Hash of the latest block.
    #[serde(with = "hex_bytes")]
    pub latest_block_hash: Vec<u8>,
    /// Height of the latest block.
    #[serde(with = "stringified")]
    pub latest_block_height: u64,
    /// RFC 3339 time of the latest block.
    pub latest_block_time: String,
    /// True while the node is still catching up with its peers.
    #[serde(default)]
    pub catching_up: bool,
}

/// Response to a `genesis` RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct GenesisResponse {
    /// The genesis document.
    pub genesis: GenesisDoc,
}

/// Genesis document fields used by the explorer.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct GenesisDoc {
    /// RFC 3339 genesis time.
    pub genesis_time: String,
    /// Chain identifier.
    pub chain_id: String,
}

/// Response to a `block` RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BlockResponse {
    /// Identifier of the block.
    pub block_id: BlockId,
    /// The block itself.
    pub block: Block,
}

/// Block identifier.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BlockId {
    /// Block hash.
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
}

/// Block header and body.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Block body.
    pub data: BlockData,
}

/// Block header fields used by the explorer.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BlockHeader {
    /// Chain identifier.
    #[serde(default)]
    pub chain_id: String,
    /// Block height.
    #[serde(with = "stringified")]
    pub height: u64,
    /// RFC 3339 block time.
    pub time: String,
    /// Address of the validator that proposed the block.
    #[serde(with = "hex_bytes")]
    pub proposer_address: Vec<u8>,
}

/// Block body.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BlockData {
    /// Raw transactions in block order.
    #[serde(with = "base64_list", default)]
    pub txs: Vec<Vec<u8>>,
}

/// Response to a `validators` RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ValidatorsResponse {
    /// Height the validator set was read at.
    #[serde(with = "stringified")]
    pub block_height: u64,
    /// Validators on the requested page.
    #[serde(default)]
    pub validators: Vec<Validator>,
    /// Number of validators on this page.
    #[serde(with = "stringified", default)]
    pub count: u64,
    /// Size of the whole validator set.
    #[serde(with = "stringified", default)]
    pub total: u64,
}

/// A single validator.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Validator {
    /// Validator address.
    #[serde(with = "hex_bytes")]
    pub address: Vec<u8>,
    /// Validator public key.
    pub pub_key: PubKey,
    /// Voting power.
    #[serde(with = "stringified")]
    pub voting_power: i64,
    /// Proposer priority.
    #[serde(with = "stringified", default)]
    pub proposer_priority: i64,
}

/// Typed public key.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PubKey {
    /// Key type tag.
    #[serde(rename = "type")]
    pub key_type: String,
    /// Raw key bytes.
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

/// Response to a `tx` RPC request.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TxResponse {
    /// Transaction hash.
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    /// Height of the block holding the transaction.
    #[serde(with = "stringified")]
    pub height: u64,
    /// Position of the transaction inside its block.
    #[serde(default)]
    pub index: u32,
    /// Execution result.
    #[serde(default)]
    pub tx_result: TxResult,
    /// Raw transaction bytes.
    #[serde(with = "base64_bytes", default)]
    pub tx: Vec<u8>,
}

/// Execution result of a transaction.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct TxResult {
    /// Result code, zero on success.
    pub code: u32,
    /// Result data.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Execution log.
    pub log: String,
    /// Additional information.
    pub info: String,
    /// Gas requested.
    #[serde(with = "stringified")]
    pub gas_wanted: i64,
    /// Gas consumed.
    #[serde(with = "stringified")]
    pub gas_used: i64,
    /// Code namespace.
    pub codespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_block() {
        let json = r#"{
            "block_id": {"hash": "0A0B", "parts": {"total": 1, "hash": "FF"}},
            "block": {
                "header": {
                    "chain_id": "vochain",
                    "height": "101",
                    "time": "2020-06-01T10:00:00.5Z",
                    "proposer_address": "ABCD"
                },
                "data": {"txs": ["eyJ0eXBlIjoidm90ZSJ9"]},
                "last_commit": {}
            }
        }"#;
        let block: BlockResponse = serde_json::from_str(json).unwrap();
        assert_eq!(block.block_id.hash, vec![0x0a, 0x0b]);
        assert_eq!(block.block.header.height, 101);
        assert_eq!(block.block.header.proposer_address, vec![0xab, 0xcd]);
        assert_eq!(block.block.data.txs, vec![br#"{"type":"vote"}"#.to_vec()]);
    }

    #[test]
    fn decodes_empty_block_body() {
        let json = r#"{
            "block_id": {"hash": "00"},
            "block": {
                "header": {"height": "1", "time": "2020-06-01T10:00:00Z", "proposer_address": "01"},
                "data": {"txs": null}
            }
        }"#;
        let block: BlockResponse = serde_json::from_str(json).unwrap();
        assert!(block.block.data.txs.is_empty());
    }

    #[test]
    fn decodes_validators_page() {
        let json = r#"{
            "block_height": "55",
            "validators": [{
                "address": "0102",
                "pub_key": {"type": "tendermint/PubKeyEd25519", "value": "AQID"},
                "voting_power": "10",
                "proposer_priority": "-3"
            }],
            "count": "1",
            "total": "1"
        }"#;
        let page: ValidatorsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.block_height, 55);
        assert_eq!(page.validators[0].voting_power, 10);
        assert_eq!(page.validators[0].proposer_priority, -3);
        assert_eq!(page.validators[0].pub_key.value, vec![1, 2, 3]);
    }

    #[test]
    fn decodes_tx_result() {
        let json = r#"{
            "hash": "AA",
            "height": "7",
            "index": 2,
            "tx_result": {"code": 0, "data": null, "log": "", "gas_wanted": "0", "gas_used": "0"},
            "tx": "AQ=="
        }"#;
        let tx: TxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tx.height, 7);
        assert_eq!(tx.index, 2);
        assert_eq!(tx.tx, vec![1]);
        assert!(tx.tx_result.data.is_empty());
    }
}
