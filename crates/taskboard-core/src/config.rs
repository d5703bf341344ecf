use std::time::Duration;

use crate::error::StoreError;

/// Entry count above which a save triggers an eviction pass.
pub const DEFAULT_CAPACITY: usize = 1000;
/// Age after which completed or failed tasks become evictable.
pub const DEFAULT_MAX_COMPLETED_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Period of the background reaper.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Heuristic per-entry overhead added to the key length in memory estimates.
pub const ENTRY_OVERHEAD_BYTES: u64 = 100;

/// Limits applied by [`crate::TaskStateStore`] and its reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub capacity: usize,
    pub max_completed_age: Duration,
    pub reap_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_completed_age: DEFAULT_MAX_COMPLETED_AGE,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_completed_age(mut self, max_age: Duration) -> Self {
        self.max_completed_age = max_age;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Checks settings that only matter once a reaper is started.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.reap_interval.is_zero() {
            return Err(StoreError::InvalidConfig(
                "reap_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
