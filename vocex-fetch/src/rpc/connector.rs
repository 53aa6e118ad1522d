//! JSON-RPC client for the consensus node.
//!
//! Every call takes a process-wide request id, claims one pooled connection for the
//! duration of its write/read pair and checks the response id against the request. Calls
//! are never retried here.

use std::{
    any::type_name,
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use base64::{engine::general_purpose, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use vocex_common::NodeConfig;

use crate::rpc::{
    error::{RpcError, RpcRequestError, TransportError},
    pool::ConnectionPool,
    response::{BlockResponse, GenesisResponse, StatusResponse, TxResponse, ValidatorsResponse},
};

static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(0);

#[derive(Serialize, Deserialize, Debug)]
struct RpcRequest<T> {
    jsonrpc: String,
    method: String,
    params: T,
    id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
struct RpcResponse<T> {
    id: i64,
    jsonrpc: Option<String>,
    result: Option<T>,
    error: Option<RpcError>,
}

/// Node RPC client backed by a [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct NodeConnector {
    pool: ConnectionPool,
    request_timeout: Duration,
}

impl NodeConnector {
    /// Wraps an already connected pool.
    pub fn new(pool: ConnectionPool, request_timeout: Duration) -> Self {
        Self {
            pool,
            request_timeout,
        }
    }

    /// Dials the node described by `config`.
    pub async fn connect(config: &NodeConfig) -> Result<Self, TransportError> {
        let pool = ConnectionPool::connect(
            config.rpc_url.clone(),
            config.pool_size,
            Duration::from_secs(config.dial_timeout),
        )
        .await?;
        Ok(Self::new(pool, Duration::from_secs(config.request_timeout)))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close_all().await;
    }

    /// Sends a JSON-RPC request and decodes its result.
    ///
    /// The request timeout covers both waiting for a free connection and the exchange
    /// itself. A connection whose exchange failed or timed out is re-dialled before it is
    /// handed back to the pool, so a late reply can never be read by the next caller.
    async fn send_request<T, R>(&self, method: &str, params: T) -> Result<R, RpcRequestError>
    where
        T: std::fmt::Debug + Serialize,
        R: DeserializeOwned,
    {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::to_string(&RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        })
        .map_err(RpcRequestError::JsonRpc)?;

        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let conn = tokio::time::timeout_at(deadline, self.pool.acquire())
            .await
            .map_err(|_| RpcRequestError::Timeout)?;

        let text = match tokio::time::timeout_at(deadline, conn.send_receive(&body)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("{method} failed on connection {}: {e}", conn.index());
                let _ = conn.restart().await;
                return Err(RpcRequestError::Transport(e));
            }
            Err(_) => {
                warn!("{method} timed out on connection {}", conn.index());
                let _ = conn.restart().await;
                return Err(RpcRequestError::Timeout);
            }
        };
        drop(conn);

        let response: RpcResponse<R> = serde_json::from_str(&text)
            .map_err(|e| TransportError::BadNodeData(Box::new(e), type_name::<R>()))?;
        if response.id != id {
            return Err(RpcRequestError::IdMismatch {
                expected: id,
                got: response.id,
            });
        }

        match (response.error, response.result) {
            (Some(error), _) => Err(RpcRequestError::Method(error)),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(RpcRequestError::EmptyResponse),
        }
    }

    /// Returns the node's identity and sync progress.
    pub async fn status(&self) -> Result<StatusResponse, RpcRequestError> {
        self.send_request("status", json!({})).await
    }

    /// Returns the chain's genesis document.
    pub async fn genesis(&self) -> Result<GenesisResponse, RpcRequestError> {
        self.send_request("genesis", json!({})).await
    }

    /// Returns the block at `height`.
    pub async fn block(&self, height: u64) -> Result<BlockResponse, RpcRequestError> {
        debug!("Fetching block {height}");
        self.send_request("block", json!({ "height": height.to_string() }))
            .await
    }

    /// Returns one page of the validator set at `height`.
    ///
    /// Pages are numbered from 1.
    pub async fn validators(
        &self,
        height: u64,
        page: u32,
        per_page: u32,
    ) -> Result<ValidatorsResponse, RpcRequestError> {
        self.send_request(
            "validators",
            json!({
                "height": height.to_string(),
                "page": page.to_string(),
                "per_page": per_page.to_string(),
            }),
        )
        .await
    }

    /// Returns the transaction with the given hash and its execution result.
    pub async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResponse, RpcRequestError> {
        self.send_request(
            "tx",
            json!({
                "hash": general_purpose::STANDARD.encode(hash),
                "prove": prove,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::Value;

    use super::*;
    use crate::rpc::test_server::spawn_server;

    fn reply(request: &str, result: Value) -> String {
        let request: Value = serde_json::from_str(request).unwrap();
        json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string()
    }

    async fn connector(server: &crate::rpc::test_server::EchoServer) -> NodeConnector {
        let pool = ConnectionPool::connect(server.url(), 2, Duration::from_secs(5))
            .await
            .unwrap();
        NodeConnector::new(pool, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn status_decodes_height() {
        let server = spawn_server(Arc::new(|req: &str| {
            reply(
                req,
                json!({
                    "node_info": {"network": "vochain"},
                    "sync_info": {
                        "latest_block_hash": "ABCD",
                        "latest_block_height": "105",
                        "latest_block_time": "2020-06-01T10:00:00Z"
                    }
                }),
            )
        }))
        .await;
        let node = connector(&server).await;

        let status = node.status().await.unwrap();
        assert_eq!(status.sync_info.latest_block_height, 105);
        assert_eq!(status.node_info.network, "vochain");
    }

    #[tokio::test]
    async fn request_envelope_is_json_rpc() {
        let server = spawn_server(Arc::new(|req: &str| {
            let parsed: Value = serde_json::from_str(req).unwrap();
            assert_eq!(parsed["jsonrpc"], "2.0");
            assert_eq!(parsed["method"], "validators");
            assert_eq!(parsed["params"]["page"], "2");
            assert_eq!(parsed["params"]["per_page"], "100");
            reply(
                req,
                json!({"block_height": "9", "validators": [], "count": "0", "total": "0"}),
            )
        }))
        .await;
        let node = connector(&server).await;

        let page = node.validators(9, 2, 100).await.unwrap();
        assert_eq!(page.block_height, 9);
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let server = {
            let seen = seen.clone();
            spawn_server(Arc::new(move |req: &str| {
                let parsed: Value = serde_json::from_str(req).unwrap();
                seen.lock().unwrap().push(parsed["id"].as_i64().unwrap());
                reply(req, json!({"genesis": {"chain_id": "c", "genesis_time": "t"}}))
            }))
            .await
        };
        let node = connector(&server).await;

        node.genesis().await.unwrap();
        node.genesis().await.unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen[1] > seen[0]);
    }

    #[tokio::test]
    async fn method_errors_are_surfaced() {
        let server = spawn_server(Arc::new(|req: &str| {
            let parsed: Value = serde_json::from_str(req).unwrap();
            json!({
                "jsonrpc": "2.0",
                "id": parsed["id"],
                "error": {"code": -32603, "message": "Internal error", "data": "height 900 is not available"}
            })
            .to_string()
        }))
        .await;
        let node = connector(&server).await;

        let err = node.block(900).await.unwrap_err();
        assert!(matches!(err, RpcRequestError::Method(RpcError { code: -32603, .. })));
    }

    #[tokio::test]
    async fn mismatched_ids_are_rejected() {
        let server = spawn_server(Arc::new(|_req: &str| {
            json!({"jsonrpc": "2.0", "id": -1, "result": {"genesis": {}}}).to_string()
        }))
        .await;
        let node = connector(&server).await;

        let err = node.genesis().await.unwrap_err();
        assert!(matches!(err, RpcRequestError::IdMismatch { got: -1, .. }));
    }

    #[tokio::test]
    async fn tx_hash_is_sent_as_base64() {
        let calls = Arc::new(AtomicUsize::new(0));
        let server = {
            let calls = calls.clone();
            spawn_server(Arc::new(move |req: &str| {
                calls.fetch_add(1, Ordering::SeqCst);
                let parsed: Value = serde_json::from_str(req).unwrap();
                assert_eq!(parsed["params"]["hash"], "AQI=");
                assert_eq!(parsed["params"]["prove"], false);
                reply(
                    req,
                    json!({"hash": "0102", "height": "3", "index": 0, "tx_result": {}, "tx": "AA=="}),
                )
            }))
            .await
        };
        let node = connector(&server).await;

        let tx = node.tx(&[1, 2], false).await.unwrap();
        assert_eq!(tx.height, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(node.pool().claimed(), 0);
    }
}
