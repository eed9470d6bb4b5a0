use super::day::CalendarDay;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::Serialize;

pub const MIN_SEMESTER: i64 = 1;
pub const MAX_SEMESTER: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::parse(raw).ok_or_else(|| FromSqlError::Other(format!("unknown role {raw:?}").into()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub branch_code: Option<String>,
    pub semester: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub branch_id: String,
    pub semester: i64,
    pub code: Option<String>,
    pub name: String,
}

/// One stored attendance mark.
///
/// `branch_id` and `semester` are copied from the teacher and the student
/// when the row is first created and are never resynchronised afterwards;
/// historical aggregates read them as "as of marking".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub branch_id: String,
    pub semester: i64,
    pub date: CalendarDay,
    pub present: bool,
    pub marked_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Created,
    Updated,
    Unchanged,
}

pub fn check_semester(field: &'static str, semester: i64) -> super::Result<i64> {
    if (MIN_SEMESTER..=MAX_SEMESTER).contains(&semester) {
        Ok(semester)
    } else {
        Err(super::AttendanceError::validation(
            field,
            format!("{field} must be between {MIN_SEMESTER} and {MAX_SEMESTER}"),
        ))
    }
}
