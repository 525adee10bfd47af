//! Stored report records and query filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::model::ParsedReport;

/// A report accepted by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: u64,
    #[serde(flatten)]
    pub report: ParsedReport,
}

impl StoredReport {
    /// Creation time assigned by the store.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.report.created
    }
}

/// Selection of stored reports.
///
/// `since` is inclusive and `until` exclusive. Unset bounds do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub valid: Option<bool>,
    pub limit: Option<usize>,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `report` falls inside the filter's bounds (ignores `limit`).
    pub fn matches(&self, report: &StoredReport) -> bool {
        if let Some(valid) = self.valid {
            if report.report.is_valid != valid {
                return false;
            }
        }
        if self.since.is_none() && self.until.is_none() {
            return true;
        }
        let created = match report.created() {
            Some(created) => created,
            None => return false,
        };
        self.since.map_or(true, |since| created >= since)
            && self.until.map_or(true, |until| created < until)
    }
}
