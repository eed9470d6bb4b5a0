use super::directory;
use super::error::Result;
use super::gate;
use super::model::{check_semester, AttendanceRecord, MAX_SEMESTER, MIN_SEMESTER};
use super::store::{self, Tally};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// `round(present / total * 100)`, half rounding up, and 0 when there is
/// nothing to divide by.
pub fn percentage(present: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let present = present.clamp(0, total);
    (present * 200 + total) / (total * 2)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    pub total_days: i64,
    pub present_days: i64,
    pub absent_days: i64,
    pub percentage: i64,
}

impl From<Tally> for AttendanceCounts {
    fn from(t: Tally) -> Self {
        Self {
            total_days: t.total,
            present_days: t.present,
            absent_days: t.total - t.present,
            percentage: percentage(t.present, t.total),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRate {
    pub total_records: i64,
    pub present_records: i64,
    pub percentage: i64,
}

impl From<Tally> for RecordRate {
    fn from(t: Tally) -> Self {
        Self {
            total_records: t.total,
            present_records: t.present,
            percentage: percentage(t.present, t.total),
        }
    }
}

fn tally<'a, I>(records: I) -> Tally
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    records.into_iter().fold(Tally::default(), |mut t, r| {
        t.total += 1;
        if r.present {
            t.present += 1;
        }
        t
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCounts {
    pub year: i32,
    pub month: u32,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCounts {
    pub subject_id: String,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub summary: AttendanceCounts,
    /// Newest `(year, month)` first.
    pub monthly_breakdown: Vec<MonthlyCounts>,
    pub by_subject: Vec<SubjectCounts>,
}

pub fn monthly_breakdown(records: &[AttendanceRecord]) -> Vec<MonthlyCounts> {
    let mut groups: BTreeMap<(i32, u32), Vec<&AttendanceRecord>> = BTreeMap::new();
    for r in records {
        groups.entry((r.date.year(), r.date.month())).or_default().push(r);
    }
    groups
        .into_iter()
        .rev()
        .map(|((year, month), rows)| MonthlyCounts {
            year,
            month,
            counts: tally(rows).into(),
        })
        .collect()
}

fn subject_breakdown(records: &[AttendanceRecord]) -> Vec<SubjectCounts> {
    let mut groups: BTreeMap<&str, Tally> = BTreeMap::new();
    for r in records {
        let t = groups.entry(r.subject_id.as_str()).or_default();
        t.total += 1;
        if r.present {
            t.present += 1;
        }
    }
    groups
        .into_iter()
        .map(|(subject_id, t)| SubjectCounts {
            subject_id: subject_id.to_string(),
            counts: t.into(),
        })
        .collect()
}

pub fn get_student_history(
    conn: &Connection,
    requester_id: &str,
    student_id: &str,
) -> Result<Vec<AttendanceRecord>> {
    let student = gate::authorize_student_view(conn, requester_id, student_id)?;
    let records = store::list_for_student(conn, &student.id)?;
    debug!(requester_id, student_id, records = records.len(), "student history read");
    Ok(records)
}

pub fn get_student_summary(
    conn: &Connection,
    requester_id: &str,
    student_id: &str,
) -> Result<StudentSummary> {
    let student = gate::authorize_student_view(conn, requester_id, student_id)?;
    let records = store::list_for_student(conn, &student.id)?;
    debug!(requester_id, student_id, records = records.len(), "student summary read");
    Ok(StudentSummary {
        summary: tally(&records).into(),
        monthly_breakdown: monthly_breakdown(&records),
        by_subject: subject_breakdown(&records),
        student_id: student.id,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSemesterCounts {
    pub student_id: String,
    pub name: String,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub branch_id: String,
    pub semester: i64,
    pub per_student: Vec<StudentSemesterCounts>,
}

/// One row per enrolled student, counting marks taken while the student was
/// in this branch and semester. Students without marks report zeros.
pub fn get_semester_summary(conn: &Connection, teacher_id: &str, semester: i64) -> Result<SemesterSummary> {
    let scope = gate::resolve_teacher(conn, teacher_id)?;
    let semester = check_semester("semester", semester)?;
    let students = directory::list_students(conn, &scope.branch.code, semester)?;
    let tallies = store::tally_by_student(conn, &scope.branch.id, semester)?;

    let per_student = students
        .into_iter()
        .map(|s| StudentSemesterCounts {
            counts: tallies.get(&s.id).copied().unwrap_or_default().into(),
            student_id: s.id,
            name: s.name,
        })
        .collect::<Vec<_>>();
    debug!(teacher_id, semester, students = per_student.len(), "semester summary read");
    Ok(SemesterSummary {
        branch_id: scope.branch.id,
        semester,
        per_student,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRate {
    pub branch_id: String,
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    pub rate: RecordRate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterRate {
    pub semester: i64,
    #[serde(flatten)]
    pub rate: RecordRate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSemesterRate {
    pub branch_id: String,
    pub code: String,
    pub semester: i64,
    #[serde(flatten)]
    pub rate: RecordRate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStats {
    pub by_branch: Vec<BranchRate>,
    pub by_semester: Vec<SemesterRate>,
    pub by_branch_and_semester: Vec<BranchSemesterRate>,
}

/// Attendance rates for every directory branch, every semester, and every
/// branch-semester cell. Cells with no marks are explicit zeros.
pub fn get_branch_stats(conn: &Connection, requester_id: &str) -> Result<BranchStats> {
    gate::require_admin(conn, requester_id)?;
    let branches = directory::list_branches(conn)?;
    let cells = store::tally_by_branch_and_semester(conn)?;

    let mut by_semester_tally: BTreeMap<i64, Tally> =
        (MIN_SEMESTER..=MAX_SEMESTER).map(|s| (s, Tally::default())).collect();
    for ((_, semester), t) in &cells {
        let acc = by_semester_tally.entry(*semester).or_default();
        acc.total += t.total;
        acc.present += t.present;
    }

    let mut by_branch = Vec::with_capacity(branches.len());
    let mut by_branch_and_semester = Vec::with_capacity(branches.len() * MAX_SEMESTER as usize);
    for b in &branches {
        let mut branch_tally = Tally::default();
        for ((branch_id, _), t) in &cells {
            if branch_id == &b.id {
                branch_tally.total += t.total;
                branch_tally.present += t.present;
            }
        }
        by_branch.push(BranchRate {
            branch_id: b.id.clone(),
            code: b.code.clone(),
            name: b.name.clone(),
            rate: branch_tally.into(),
        });
        for semester in MIN_SEMESTER..=MAX_SEMESTER {
            let t = cells
                .get(&(b.id.clone(), semester))
                .copied()
                .unwrap_or_default();
            by_branch_and_semester.push(BranchSemesterRate {
                branch_id: b.id.clone(),
                code: b.code.clone(),
                semester,
                rate: t.into(),
            });
        }
    }

    let by_semester = by_semester_tally
        .into_iter()
        .map(|(semester, t)| SemesterRate {
            semester,
            rate: t.into(),
        })
        .collect();

    debug!(requester_id, branches = branches.len(), "branch stats read");
    Ok(BranchStats {
        by_branch,
        by_semester,
        by_branch_and_semester,
    })
}
