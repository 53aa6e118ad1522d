//! Vocex daemon: loads configuration, connects to the consensus node and the gateway and
//! drives the explorer sync routines.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod indexer;
