//! Event timestamps to calendar parts
//!
//! All derivations are in UTC. `week` is the ISO-8601 week number and
//! `weekday` counts from Sunday = 0. `year` is the calendar year, which can
//! differ from the ISO week-year around New Year.

use crate::config::TimestampPrecision;
use crate::error::{PipelineError, Result};
use crate::tables::Time;
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Apply the configured precision to an epoch-millisecond event time.
#[must_use]
pub fn start_time(ts_millis: i64, precision: TimestampPrecision) -> i64 {
    match precision {
        TimestampPrecision::Millisecond => ts_millis,
        TimestampPrecision::Second => ts_millis.div_euclid(1000) * 1000,
    }
}

pub fn to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(PipelineError::InvalidTimestamp { ts: millis })
}

impl Time {
    /// Break a start time into its calendar parts.
    pub fn from_start_time(millis: i64) -> Result<Self> {
        let at = to_datetime(millis)?;
        Ok(Time {
            start_time: millis,
            hour: at.hour() as i32,
            day: at.day() as i32,
            week: at.iso_week().week() as i32,
            month: at.month() as i32,
            year: at.year(),
            weekday: at.weekday().num_days_from_sunday() as i32,
        })
    }
}
