//! Upstream clients for the Vocex explorer.
//!
//! Holds the pooled websocket JSON-RPC client used against the consensus node and the
//! signed-envelope client used against the application gateway.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod gateway;
pub mod rpc;
