use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use taskboard_model::{Report, ReportId, ReportType};
use tracing::trace;

use crate::{error::StoreError, repository::ReportRepository};

/// In-memory report storage keyed by report id.
///
/// Plain CRUD: reports stay until deleted.
#[derive(Clone, Default)]
pub struct ReportStore {
    inner: Arc<RwLock<HashMap<ReportId, Report>>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ReportId, Report>>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned("report"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ReportId, Report>>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned("report"))
    }
}

impl ReportRepository for ReportStore {
    fn load_report(&self, id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn save_report(&self, report: Report) -> Result<(), StoreError> {
        let mut reports = self.write()?;
        trace!(id = %report.id, kind = %report.kind, "report saved");
        reports.insert(report.id.clone(), report);
        Ok(())
    }

    /// Reports come back oldest first, ties broken by id.
    fn list_reports(&self, kind: Option<&ReportType>) -> Result<Vec<Report>, StoreError> {
        let reports = self.read()?;
        let mut items: Vec<Report> = reports
            .values()
            .filter(|report| kind.is_none_or(|k| &report.kind == k))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    fn delete_report(&self, id: &str) -> Result<(), StoreError> {
        if self.write()?.remove(id).is_some() {
            trace!(id, "report deleted");
        }
        Ok(())
    }
}
