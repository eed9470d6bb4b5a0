use super::day::CalendarDay;
use super::error::{AttendanceError, Result};
use super::gate::{self, TeacherScope};
use super::model::{check_semester, AttendanceRecord, RecordStatus};
use super::store::{self, Mark};
use rusqlite::Connection;
use tracing::{info, warn};

/// A mark as it arrives from a caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct MarkInput {
    pub student_id: String,
    pub subject_id: String,
    pub date: String,
    pub present: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MarkRequest {
    pub student_id: String,
    pub subject_id: String,
    pub day: CalendarDay,
    pub present: bool,
}

impl MarkInput {
    pub fn validate(&self) -> Result<MarkRequest> {
        let student_id = self.student_id.trim();
        if student_id.is_empty() {
            return Err(AttendanceError::validation("studentId", "missing studentId"));
        }
        let subject_id = self.subject_id.trim();
        if subject_id.is_empty() {
            return Err(AttendanceError::validation("subjectId", "missing subjectId"));
        }
        let day = CalendarDay::parse(&self.date)?;
        let Some(present) = self.present else {
            return Err(AttendanceError::validation("present", "present must be true or false"));
        };
        Ok(MarkRequest {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            day,
            present,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub status: RecordStatus,
    pub record: AttendanceRecord,
}

pub fn record_attendance(conn: &Connection, teacher_id: &str, mark: &MarkRequest) -> Result<RecordOutcome> {
    let scope = gate::resolve_teacher(conn, teacher_id)?;
    record_in_scope(conn, &scope, mark)
}

fn record_in_scope(conn: &Connection, scope: &TeacherScope, mark: &MarkRequest) -> Result<RecordOutcome> {
    let student = gate::resolve_student_in_scope(conn, scope, &mark.student_id)?;
    gate::resolve_subject_in_scope(conn, scope, &mark.subject_id)?;
    let semester = match student.semester {
        Some(s) => check_semester("semester", s)?,
        None => {
            return Err(AttendanceError::validation(
                "semester",
                format!("student {} has no semester", student.id),
            ))
        }
    };

    let (status, record) = store::upsert(
        conn,
        &Mark {
            student_id: &student.id,
            subject_id: &mark.subject_id,
            branch_id: &scope.branch.id,
            semester,
            day: mark.day,
            present: mark.present,
            marked_by: &scope.teacher.id,
        },
    )?;
    info!(
        teacher_id = %scope.teacher.id,
        student_id = %student.id,
        subject_id = %mark.subject_id,
        day = %mark.day,
        present = mark.present,
        status = ?status,
        "attendance recorded"
    );
    Ok(RecordOutcome { status, record })
}

#[derive(Debug)]
pub struct BatchItemResult {
    pub index: usize,
    pub student_id: String,
    pub outcome: Result<RecordOutcome>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItemResult>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Applies each mark on its own. A bad item is reported in place and the
/// rest still go through; nothing is rolled back.
///
/// The teacher is resolved once up front. If that fails no item could
/// succeed, so the whole call fails instead.
pub fn record_attendance_batch(
    conn: &Connection,
    teacher_id: &str,
    inputs: &[MarkInput],
) -> Result<BatchReport> {
    let scope = gate::resolve_teacher(conn, teacher_id)?;
    let mut report = BatchReport::default();

    for (index, input) in inputs.iter().enumerate() {
        let outcome = input
            .validate()
            .and_then(|mark| record_in_scope(conn, &scope, &mark));
        match &outcome {
            Ok(o) => match o.status {
                RecordStatus::Created => report.created += 1,
                RecordStatus::Updated => report.updated += 1,
                RecordStatus::Unchanged => report.unchanged += 1,
            },
            Err(e) => {
                report.failed += 1;
                warn!(teacher_id, index, student_id = %input.student_id, error = %e, "batch item failed");
            }
        }
        report.items.push(BatchItemResult {
            index,
            student_id: input.student_id.clone(),
            outcome,
        });
    }

    info!(
        teacher_id,
        total = inputs.len(),
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        "attendance batch applied"
    );
    Ok(report)
}
