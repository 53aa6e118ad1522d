//! Application gateway client.
//!
//! The gateway wraps every request and response in an outer envelope carrying an id and a
//! signature. Responses with an empty signature, a foreign id or `ok: false` are rejected.

pub mod connector;
pub mod error;
pub mod types;
