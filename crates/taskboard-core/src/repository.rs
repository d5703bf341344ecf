//! Storage contracts.
//!
//! The in-memory stores never fail on I/O, but both traits keep a `Result` so a
//! disk or database backed implementation can be swapped in without touching callers.

use std::collections::HashMap;

use taskboard_model::{Report, ReportType, TaskId, TaskState};

use crate::error::StoreError;

pub trait TaskStateRepository: Send + Sync {
    /// Snapshot of every tracked task state.
    fn load_all(&self) -> Result<HashMap<TaskId, TaskState>, StoreError>;

    /// Merge `updates` into the repository, last write wins per key.
    fn save_all(&self, updates: HashMap<TaskId, TaskState>) -> Result<(), StoreError>;
}

pub trait ReportRepository: Send + Sync {
    /// Returns `Ok(None)` when no report has this id.
    fn load_report(&self, id: &str) -> Result<Option<Report>, StoreError>;

    /// Insert or replace the report with the same id.
    fn save_report(&self, report: Report) -> Result<(), StoreError>;

    /// All reports, or only those of `kind` when given.
    fn list_reports(&self, kind: Option<&ReportType>) -> Result<Vec<Report>, StoreError>;

    /// Removing an unknown id is not an error.
    fn delete_report(&self, id: &str) -> Result<(), StoreError>;
}
