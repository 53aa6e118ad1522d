//! Sync pipeline tuning.

/// Tuning knobs for the sync scheduler and its routines.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of blocks fetched in one block tick.
    pub max_block_batch: u64,
    /// Validators requested per page.
    pub validator_page_size: u32,
    /// Entities or processes requested per gateway list call.
    pub list_page_size: u32,
    /// Failed attempts tolerated by a routine before it is cancelled.
    pub retry_cap: u32,
    /// Wait in milliseconds when the local store has caught up with the node.
    pub idle_wait_ms: u64,
    /// Pause in milliseconds between scheduler iterations.
    pub tick_interval_ms: u64,
    /// Validator sync runs once every this many scheduler iterations.
    pub validator_every: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_block_batch: 100,
            validator_page_size: 100,
            list_page_size: 100,
            retry_cap: 10,
            idle_wait_ms: 500,
            tick_interval_ms: 1000,
            validator_every: 40,
        }
    }
}
