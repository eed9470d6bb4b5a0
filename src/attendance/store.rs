use super::day::CalendarDay;
use super::error::{AttendanceError, Result};
use super::model::{AttendanceRecord, RecordStatus};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, student_id, subject_id, branch_id, semester, day, present, \
                              marked_by, created_at, updated_at";

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        branch_id: r.get(3)?,
        semester: r.get(4)?,
        date: r.get(5)?,
        present: r.get(6)?,
        marked_by: r.get(7)?,
        created_at: r.get(8)?,
        updated_at: r.get(9)?,
    })
}

/// Values for one upsert. `branch_id` and `semester` only land on insert.
#[derive(Debug, Clone)]
pub struct Mark<'a> {
    pub student_id: &'a str,
    pub subject_id: &'a str,
    pub branch_id: &'a str,
    pub semester: i64,
    pub day: CalendarDay,
    pub present: bool,
    pub marked_by: &'a str,
}

/// Inserts or updates the row for `(student, subject, day)` in one statement.
///
/// The conflict clause only rewrites the row when `present` actually changes,
/// so `RETURNING` yields the fresh id on insert, the existing id on a real
/// update, and nothing when the mark was already in place.
pub fn upsert(conn: &Connection, mark: &Mark<'_>) -> Result<(RecordStatus, AttendanceRecord)> {
    match try_upsert(conn, mark) {
        Err(AttendanceError::Db(ref e)) if is_unique_violation(e) => {
            // Only reachable if a writer outside this statement raced us.
            warn!(
                student_id = mark.student_id,
                subject_id = mark.subject_id,
                day = %mark.day,
                "attendance key conflict, retrying upsert"
            );
            try_upsert(conn, mark)
        }
        other => other,
    }
}

fn try_upsert(conn: &Connection, mark: &Mark<'_>) -> Result<(RecordStatus, AttendanceRecord)> {
    let tx = conn.unchecked_transaction()?;
    let new_id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let touched: Option<String> = tx
        .query_row(
            "INSERT INTO attendance(
               id, student_id, subject_id, branch_id, semester, day,
               present, marked_by, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_id, day) DO UPDATE SET
               present = excluded.present,
               marked_by = excluded.marked_by,
               updated_at = excluded.updated_at
             WHERE attendance.present <> excluded.present
             RETURNING id",
            (
                &new_id,
                mark.student_id,
                mark.subject_id,
                mark.branch_id,
                mark.semester,
                &mark.day,
                mark.present,
                mark.marked_by,
                &now,
                &now,
            ),
            |r| r.get(0),
        )
        .optional()?;

    let status = match touched {
        Some(id) if id == new_id => RecordStatus::Created,
        Some(_) => RecordStatus::Updated,
        None => RecordStatus::Unchanged,
    };
    let record = find(&tx, mark.student_id, mark.subject_id, mark.day)?.ok_or_else(|| {
        AttendanceError::not_found("attendance", format!("{}/{}/{}", mark.student_id, mark.subject_id, mark.day))
    })?;
    tx.commit()?;
    Ok((status, record))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn find(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
    day: CalendarDay,
) -> Result<Option<AttendanceRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance
         WHERE student_id = ? AND subject_id = ? AND day = ?"
    );
    Ok(conn
        .query_row(&sql, (student_id, subject_id, &day), record_from_row)
        .optional()?)
}

/// Records for one roster window: branch, semester snapshot, subject, day.
pub fn list_for_roster(
    conn: &Connection,
    branch_id: &str,
    semester: i64,
    subject_id: &str,
    day: CalendarDay,
) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance
         WHERE branch_id = ? AND semester = ? AND subject_id = ? AND day = ?
         ORDER BY student_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((branch_id, semester, subject_id, &day), record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Newest day first; same-day rows ordered by subject.
pub fn list_for_student(conn: &Connection, student_id: &str) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance
         WHERE student_id = ?
         ORDER BY day DESC, subject_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: i64,
    pub present: i64,
}

/// Per-student tallies for rows marked under `(branch, semester)`.
pub fn tally_by_student(
    conn: &Connection,
    branch_id: &str,
    semester: i64,
) -> Result<HashMap<String, Tally>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, COUNT(*), COALESCE(SUM(present), 0)
         FROM attendance
         WHERE branch_id = ? AND semester = ?
         GROUP BY student_id",
    )?;
    let rows = stmt
        .query_map((branch_id, semester), |r| {
            Ok((
                r.get::<_, String>(0)?,
                Tally {
                    total: r.get(1)?,
                    present: r.get(2)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(rows)
}

/// Tallies for every `(branch_id, semester)` pair that has rows.
pub fn tally_by_branch_and_semester(conn: &Connection) -> Result<HashMap<(String, i64), Tally>> {
    let mut stmt = conn.prepare(
        "SELECT branch_id, semester, COUNT(*), COALESCE(SUM(present), 0)
         FROM attendance
         GROUP BY branch_id, semester",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                (r.get::<_, String>(0)?, r.get::<_, i64>(1)?),
                Tally {
                    total: r.get(2)?,
                    present: r.get(3)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(rows)
}
