//! Report persistence.
//!
//! `ReportStore` is the persistence sink's seam. The store owns a report
//! once it is saved and stamps `created`/`modified`.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::report::model::ParsedReport;
use crate::storage::models::{ReportFilter, StoredReport};

/// Persistent storage for parsed reports.
pub trait ReportStore: Send + Sync {
    /// Persist `report`, assigning its id and timestamps.
    fn save(&self, report: ParsedReport) -> anyhow::Result<StoredReport>;

    /// Reports matching `filter`, newest first.
    fn query(&self, filter: &ReportFilter) -> anyhow::Result<Vec<StoredReport>>;

    /// Delete reports matching `filter` (its `limit` is ignored). Returns the
    /// number removed.
    fn delete(&self, filter: &ReportFilter) -> anyhow::Result<usize>;
}

impl<S: ReportStore + ?Sized> ReportStore for Arc<S> {
    fn save(&self, report: ParsedReport) -> anyhow::Result<StoredReport> {
        (**self).save(report)
    }

    fn query(&self, filter: &ReportFilter) -> anyhow::Result<Vec<StoredReport>> {
        (**self).query(filter)
    }

    fn delete(&self, filter: &ReportFilter) -> anyhow::Result<usize> {
        (**self).delete(filter)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    reports: Vec<StoredReport>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().reports.is_empty()
    }

    /// Every stored report, newest first.
    pub fn all(&self) -> Vec<StoredReport> {
        let mut reports = self.state.lock().reports.clone();
        newest_first(&mut reports);
        reports
    }
}

impl ReportStore for MemoryStore {
    fn save(&self, mut report: ParsedReport) -> anyhow::Result<StoredReport> {
        let mut state = self.state.lock();
        let now = Utc::now();
        report.created = Some(report.created.unwrap_or(now));
        report.modified = Some(now);

        state.next_id += 1;
        let stored = StoredReport {
            id: state.next_id,
            report,
        };
        state.reports.push(stored.clone());
        Ok(stored)
    }

    fn query(&self, filter: &ReportFilter) -> anyhow::Result<Vec<StoredReport>> {
        let mut matched: Vec<StoredReport> = self
            .state
            .lock()
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        newest_first(&mut matched);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn delete(&self, filter: &ReportFilter) -> anyhow::Result<usize> {
        let mut state = self.state.lock();
        let before = state.reports.len();
        state.reports.retain(|r| !filter.matches(r));
        let removed = before - state.reports.len();
        log::info!("REPORTS_DELETED count={} filter={:?}", removed, filter);
        Ok(removed)
    }
}

/// Order by creation time descending, ties broken by id descending.
fn newest_first(reports: &mut [StoredReport]) {
    reports.sort_by(|a, b| b.created().cmp(&a.created()).then(b.id.cmp(&a.id)));
}
