//! Hold error types for the node connection pool and RPC client.

use std::fmt;

/// General error type for handling connection pool errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Type for errors without an underlying source.
    #[error("Error: {0}")]
    PoolError(String),

    /// Websocket protocol or IO errors.
    #[error("Error: Websocket Error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    /// URL Parse Errors.
    #[error("Error: Invalid URL:{0}")]
    UrlParseError(#[from] url::ParseError),

    /// The peer closed the connection or it was closed by the pool.
    #[error("Error: connection closed")]
    ConnectionClosed,

    /// Dialling the node did not complete in time.
    #[error("Error: dial timed out after {0} seconds")]
    DialTimeout(u64),

    /// The node returned data that could not be decoded into the named type.
    #[error("Error: Node returned bad data for {1}: {0}")]
    BadNodeData(
        Box<dyn std::error::Error + Send + Sync + 'static>,
        &'static str,
    ),
}

impl TransportError {
    /// Constructor for errors without an underlying source
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError::PoolError(msg.into())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::PoolError(e.to_string())
    }
}

/// JSON-RPC error object returned by the node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RpcError {
    /// Error Code.
    pub code: i64,
    /// Error Message.
    pub message: String,
    /// Error Data.
    #[serde(default)]
    pub data: Option<String>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(
                f,
                "RPC Error (code: {}): {}: {}",
                self.code, self.message, data
            ),
            None => write!(f, "RPC Error (code: {}): {}", self.code, self.message),
        }
    }
}

impl std::error::Error for RpcError {}

/// Error type for JSON-RPC requests.
#[derive(Debug, thiserror::Error)]
pub enum RpcRequestError {
    /// Error variant for errors related to the transport layer.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The node answered with a JSON-RPC error object.
    #[error("Method error: {0}")]
    Method(RpcError),

    /// The provided input failed to serialize.
    #[error("request input failed to serialize: {0:?}")]
    JsonRpc(serde_json::Error),

    /// The call did not complete within its deadline.
    #[error("request timed out")]
    Timeout,

    /// The response carried an id other than the one sent.
    #[error("response id {got} does not match request id {expected}")]
    IdMismatch {
        /// Id sent with the request.
        expected: i64,
        /// Id found in the response.
        got: i64,
    },

    /// The response carried neither a result nor an error.
    #[error("empty response from node")]
    EmptyResponse,
}
