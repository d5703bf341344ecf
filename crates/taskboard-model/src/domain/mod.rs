mod task_id;
pub use task_id::TaskId;

mod task_state;
pub use task_state::TaskState;

mod store_stats;
pub use store_stats::StoreStats;

mod report;
pub use report::{Report, ReportType};

/// Identifier of a stored report.
pub type ReportId = String;
