//! Consensus node connection configuration.

use url::Url;

/// Consensus node (Tendermint RPC) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Websocket endpoint of the node RPC service.
    pub rpc_url: Url,
    /// Number of persistent connections held by the pool.
    pub pool_size: usize,
    /// Per-call RPC timeout in seconds.
    pub request_timeout: u64,
    /// Dial timeout in seconds for each pooled connection.
    pub dial_timeout: u64,
    /// Start-up connection attempts before running detached.
    pub connect_attempts: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse("ws://127.0.0.1:26657/websocket")
                .expect("static url is valid"),
            pool_size: 10,
            request_timeout: 20,
            dial_timeout: 10,
            connect_attempts: 10,
        }
    }
}
