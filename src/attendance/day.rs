//! Calendar-day value used for every attendance key, query window and
//! comparison.
//!
//! Convention: the day is the date as written by the caller, in the caller's
//! own offset. Time-of-day and offset are dropped; nothing is ever converted
//! to UTC or to the host's local zone. `2024-03-05T23:30:00+05:30` is
//! 2024-03-05, and so is `2024-03-05T00:10:00-08:00`.

use super::error::{AttendanceError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};
use std::fmt;

const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn parse(raw: &str) -> Result<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return Err(AttendanceError::validation("date", "date must not be empty"));
        }
        if let Ok(d) = NaiveDate::parse_from_str(t, DAY_FORMAT) {
            return Ok(Self(d));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
            return Ok(Self(dt.naive_local().date()));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
                return Ok(Self(dt.date()));
            }
        }
        Err(AttendanceError::validation(
            "date",
            format!("date must be YYYY-MM-DD or an RFC 3339 timestamp, got {t:?}"),
        ))
    }

    pub fn storage_key(&self) -> String {
        self.0.format(DAY_FORMAT).to_string()
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl ToSql for CalendarDay {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.storage_key()))
    }
}

impl FromSql for CalendarDay {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        NaiveDate::parse_from_str(raw, DAY_FORMAT)
            .map(Self)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}
