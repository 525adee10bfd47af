//! Date inputs for storage maintenance filters.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};

/// Start of the day named by a `YYYY-MM-DD` string, in UTC.
pub fn parse_date_input(value: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| Error::InvalidDate(value.to_string()))
}

/// Most recent local midnight.
pub fn last_midnight() -> DateTime<Utc> {
    midnight_before(&chrono::Local::now())
}

/// Midnight starting the day of `now` in its own timezone, as UTC.
///
/// When local midnight does not exist (a DST jump at 00:00) the UTC
/// midnight of the same calendar date is used.
pub fn midnight_before<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let date = now.date_naive();
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    naive
        .and_local_timezone(now.timezone())
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
