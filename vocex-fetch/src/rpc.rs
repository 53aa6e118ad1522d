//! Consensus node JSON-RPC client over a pool of persistent websockets.

pub mod connector;
pub mod error;
pub mod pool;
pub mod response;

#[cfg(test)]
pub(crate) mod test_server;
