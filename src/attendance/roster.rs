use super::day::CalendarDay;
use super::directory;
use super::error::Result;
use super::gate;
use super::model::check_semester;
use super::store;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    /// False when no mark exists: an unmarked student counts as absent.
    pub present: bool,
    pub record_id: Option<String>,
    pub marked_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub branch_id: String,
    pub semester: i64,
    pub subject_id: String,
    pub date: CalendarDay,
    pub total_students: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub roster: Vec<RosterEntry>,
}

/// Every enrolled student of the teacher's branch and `semester`, once each,
/// merged with the marks for `subject_id` on `day`.
pub fn get_roster(
    conn: &Connection,
    teacher_id: &str,
    day: CalendarDay,
    semester: i64,
    subject_id: &str,
) -> Result<Roster> {
    let scope = gate::resolve_teacher(conn, teacher_id)?;
    let semester = check_semester("semester", semester)?;
    gate::resolve_subject_in_scope(conn, &scope, subject_id)?;

    let students = directory::list_students(conn, &scope.branch.code, semester)?;
    let records = store::list_for_roster(conn, &scope.branch.id, semester, subject_id, day)?;
    let by_student: HashMap<&str, _> = records.iter().map(|r| (r.student_id.as_str(), r)).collect();

    let roster: Vec<RosterEntry> = students
        .into_iter()
        .map(|s| {
            let record = by_student.get(s.id.as_str());
            RosterEntry {
                present: record.map(|r| r.present).unwrap_or(false),
                record_id: record.map(|r| r.id.clone()),
                marked_by: record.map(|r| r.marked_by.clone()),
                student_id: s.id,
                name: s.name,
            }
        })
        .collect();

    let total_students = roster.len();
    let present_count = roster.iter().filter(|e| e.present).count();
    debug!(
        teacher_id,
        branch = %scope.branch.code,
        semester,
        subject_id,
        day = %day,
        total_students,
        present_count,
        "roster built"
    );
    Ok(Roster {
        branch_id: scope.branch.id,
        semester,
        subject_id: subject_id.to_string(),
        date: day,
        total_students,
        present_count,
        absent_count: total_students - present_count,
        roster,
    })
}
