//! Hold error types for the gateway client.

/// Errors returned by the gateway client.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Reqwest Based Errors.
    #[error("Error: HTTP Request Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// Websocket protocol or IO errors.
    #[error("Error: Websocket Error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    /// Request or response failed to (de)serialize.
    #[error("Error: Serialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Only http(s) and ws(s) endpoints are supported.
    #[error("Error: gateway url must use http(s):// or ws(s)://, got {0}")]
    UnsupportedScheme(String),

    /// The websocket was closed by the gateway.
    #[error("Error: gateway connection closed")]
    ConnectionClosed,

    /// The request did not complete within its deadline.
    #[error("{0}: request timed out")]
    Timeout(String),

    /// The response id does not match the request id.
    #[error("{method}: request id doesn't match")]
    IdMismatch {
        /// Gateway method called.
        method: String,
    },

    /// The response carried no signature.
    #[error("{method}: empty signature in response")]
    EmptySignature {
        /// Gateway method called.
        method: String,
    },

    /// The gateway answered with `ok: false`.
    #[error("{method}: request failed: {message}")]
    NotOk {
        /// Gateway method called.
        method: String,
        /// Message returned by the gateway.
        message: String,
    },

    /// The response lacked a field the method needs.
    #[error("{method}: response is missing {field}")]
    MissingField {
        /// Gateway method called.
        method: String,
        /// Name of the missing field.
        field: &'static str,
    },
}
