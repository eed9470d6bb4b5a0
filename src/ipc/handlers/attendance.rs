use crate::attendance::day::CalendarDay;
use crate::attendance::recorder::{self, MarkInput};
use crate::attendance::{roster, summary, AttendanceError, Result};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_i64, get_required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn mark_input(params: &serde_json::Value) -> MarkInput {
    MarkInput {
        student_id: str_or_empty(params, "studentId"),
        subject_id: str_or_empty(params, "subjectId"),
        date: str_or_empty(params, "date"),
        present: params.get("present").and_then(|v| v.as_bool()),
    }
}

fn attendance_record(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let mark = mark_input(params).validate()?;
    let outcome = recorder::record_attendance(conn, &teacher_id, &mark)?;
    Ok(json!({
        "status": outcome.status,
        "record": outcome.record,
    }))
}

fn attendance_record_batch(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let Some(items) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(AttendanceError::validation("records", "missing records"));
    };
    let inputs: Vec<MarkInput> = items.iter().map(mark_input).collect();
    let report = recorder::record_attendance_batch(conn, &teacher_id, &inputs)?;

    let results: Vec<serde_json::Value> = report
        .items
        .iter()
        .map(|item| match &item.outcome {
            Ok(o) => json!({
                "index": item.index,
                "studentId": item.student_id,
                "ok": true,
                "status": o.status,
                "recordId": o.record.id,
            }),
            Err(e) => json!({
                "index": item.index,
                "studentId": item.student_id,
                "ok": false,
                "error": e.to_json(),
            }),
        })
        .collect();
    Ok(json!({
        "results": results,
        "created": report.created,
        "updated": report.updated,
        "unchanged": report.unchanged,
        "failed": report.failed,
    }))
}

fn attendance_roster(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let day = CalendarDay::parse(&get_required_str(params, "date")?)?;
    let semester = get_required_i64(params, "semester")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let roster = roster::get_roster(conn, &teacher_id, day, semester, &subject_id)?;
    Ok(json!(roster))
}

fn attendance_student_history(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let requester_id = get_required_str(params, "requesterId")?;
    let student_id = get_required_str(params, "studentId")?;
    let records = summary::get_student_history(conn, &requester_id, &student_id)?;
    Ok(json!({ "studentId": student_id, "records": records }))
}

fn attendance_student_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let requester_id = get_required_str(params, "requesterId")?;
    let student_id = get_required_str(params, "studentId")?;
    Ok(json!(summary::get_student_summary(conn, &requester_id, &student_id)?))
}

fn attendance_semester_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let semester = get_required_i64(params, "semester")?;
    Ok(json!(summary::get_semester_summary(conn, &teacher_id, semester)?))
}

fn attendance_branch_stats(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let requester_id = get_required_str(params, "requesterId")?;
    Ok(json!(summary::get_branch_stats(conn, &requester_id)?))
}

type AttendanceOp = fn(&Connection, &serde_json::Value) -> Result<serde_json::Value>;

fn run(state: &mut AppState, req: &Request, op: AttendanceOp) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match op(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: AttendanceOp = match req.method.as_str() {
        "attendance.record" => attendance_record,
        "attendance.recordBatch" => attendance_record_batch,
        "attendance.roster" => attendance_roster,
        "attendance.studentHistory" => attendance_student_history,
        "attendance.studentSummary" => attendance_student_summary,
        "attendance.semesterSummary" => attendance_semester_summary,
        "attendance.branchStats" => attendance_branch_stats,
        _ => return None,
    };
    Some(run(state, req, op))
}
