use serde::{Deserialize, Serialize};

/// Aggregate view over the task state store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of tracked tasks.
    pub total_tasks: usize,
    /// Tasks in a non-terminal state.
    pub active_tasks: usize,
    /// Tasks that completed or failed.
    pub completed_tasks: usize,
    /// Approximate footprint in whole mebibytes (rounded down).
    pub memory_usage_mb: u64,
}
