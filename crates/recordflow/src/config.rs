//! Engine configuration handed in by the hosting application.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_poll_interval_secs() -> u64 {
    30
}

/// Configuration for one engine run.
///
/// The entity type list is fixed at configuration time; the engine does
/// no topic discovery of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Entity types to track, one sync worker each.
    pub entity_types: Vec<String>,

    /// Seconds to sleep between poll cycles once the feed is drained.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// When true, all workers run as independent concurrent tasks.
    /// When false, workers take strict turns, one poll cycle at a time.
    #[serde(default)]
    pub process_all_entity_types_concurrently: bool,
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            entity_types: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            process_all_entity_types_concurrently: false,
        }
    }
}
