//! The upstream services the sync engine reads from.
//!
//! The engine is generic over these traits so routines can be driven by the live
//! connectors or by in-process fakes.

use async_trait::async_trait;
use vocex_fetch::{
    gateway::{connector::GatewayConnector, error::GatewayError, types::ProcessResults},
    rpc::{
        connector::NodeConnector,
        error::RpcRequestError,
        response::{
            BlockResponse, GenesisResponse, StatusResponse, TxResponse, ValidatorsResponse,
        },
    },
};

/// Read access to the consensus node.
#[async_trait]
pub trait NodeSource: Clone + Send + Sync + 'static {
    /// Node identity and latest block.
    async fn status(&self) -> Result<StatusResponse, RpcRequestError>;

    /// Genesis document.
    async fn genesis(&self) -> Result<GenesisResponse, RpcRequestError>;

    /// Block at `height`.
    async fn block(&self, height: u64) -> Result<BlockResponse, RpcRequestError>;

    /// One 1-based page of the validator set at `height`.
    async fn validators(
        &self,
        height: u64,
        page: u32,
        per_page: u32,
    ) -> Result<ValidatorsResponse, RpcRequestError>;

    /// Transaction with hash `hash`.
    async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResponse, RpcRequestError>;
}

/// Read access to the application gateway.
#[async_trait]
pub trait GatewaySource: Clone + Send + Sync + 'static {
    /// Number of entities known to the gateway.
    async fn entity_count(&self) -> Result<u64, GatewayError>;

    /// Number of processes known to the gateway.
    async fn process_count(&self) -> Result<u64, GatewayError>;

    /// Entity ids following `from_id`.
    async fn entity_list(&self, from_id: &str, list_size: u32)
        -> Result<Vec<String>, GatewayError>;

    /// Process ids of `entity_id` following `from_id`.
    async fn process_list(
        &self,
        entity_id: &str,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError>;

    /// Current results of a process.
    async fn results(&self, process_id: &str) -> Result<ProcessResults, GatewayError>;
}

#[async_trait]
impl NodeSource for NodeConnector {
    async fn status(&self) -> Result<StatusResponse, RpcRequestError> {
        NodeConnector::status(self).await
    }

    async fn genesis(&self) -> Result<GenesisResponse, RpcRequestError> {
        NodeConnector::genesis(self).await
    }

    async fn block(&self, height: u64) -> Result<BlockResponse, RpcRequestError> {
        NodeConnector::block(self, height).await
    }

    async fn validators(
        &self,
        height: u64,
        page: u32,
        per_page: u32,
    ) -> Result<ValidatorsResponse, RpcRequestError> {
        NodeConnector::validators(self, height, page, per_page).await
    }

    async fn tx(&self, hash: &[u8], prove: bool) -> Result<TxResponse, RpcRequestError> {
        NodeConnector::tx(self, hash, prove).await
    }
}

#[async_trait]
impl GatewaySource for GatewayConnector {
    async fn entity_count(&self) -> Result<u64, GatewayError> {
        GatewayConnector::entity_count(self).await
    }

    async fn process_count(&self) -> Result<u64, GatewayError> {
        GatewayConnector::process_count(self).await
    }

    async fn entity_list(
        &self,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        GatewayConnector::entity_list(self, from_id, list_size).await
    }

    async fn process_list(
        &self,
        entity_id: &str,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        GatewayConnector::process_list(self, entity_id, from_id, list_size).await
    }

    async fn results(&self, process_id: &str) -> Result<ProcessResults, GatewayError> {
        GatewayConnector::results(self, process_id).await
    }
}
