pub mod error;
pub use error::StoreError;
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};
pub mod config;
pub use config::StoreConfig;
pub mod repository;
pub use repository::{ReportRepository, TaskStateRepository};
pub mod state;
pub use state::TaskStateStore;
pub mod reaper;
pub use reaper::{Reaper, ReaperHandle};
pub mod report;
pub use report::ReportStore;
