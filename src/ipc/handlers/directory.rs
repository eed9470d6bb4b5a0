use crate::attendance::directory::{self, SubjectInput, UserFilter, UserInput};
use crate::attendance::model::Role;
use crate::attendance::{AttendanceError, Result};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_i64, get_optional_str, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn parse_role(params: &serde_json::Value, key: &'static str) -> Result<Option<Role>> {
    match get_optional_str(params, key) {
        None => Ok(None),
        Some(raw) => Role::parse(&raw).map(Some).ok_or_else(|| {
            AttendanceError::validation(key, "role must be student, teacher or admin")
        }),
    }
}

fn branches_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let code = get_required_str(params, "code")?;
    let name = get_optional_str(params, "name").unwrap_or_else(|| code.clone());
    let branch_id = directory::upsert_branch(conn, get_optional_str(params, "id"), &code, &name)?;
    Ok(json!({ "branchId": branch_id }))
}

fn branches_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value> {
    Ok(json!({ "branches": directory::list_branches(conn)? }))
}

fn users_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let name = get_required_str(params, "name")?;
    let Some(role) = parse_role(params, "role")? else {
        return Err(AttendanceError::validation("role", "missing role"));
    };
    let user_id = directory::upsert_user(
        conn,
        UserInput {
            id: get_optional_str(params, "id"),
            name,
            role,
            branch_code: get_optional_str(params, "branchCode"),
            semester: get_optional_i64(params, "semester")?,
        },
    )?;
    Ok(json!({ "userId": user_id }))
}

fn users_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let user_id = get_required_str(params, "userId")?;
    let user = directory::get_user(conn, &user_id)?
        .ok_or_else(|| AttendanceError::not_found("user", &user_id))?;
    Ok(json!({ "user": user }))
}

fn users_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let filter = UserFilter {
        role: parse_role(params, "role")?,
        branch_code: get_optional_str(params, "branchCode"),
        semester: get_optional_i64(params, "semester")?,
    };
    Ok(json!({ "users": directory::list_users(conn, &filter)? }))
}

fn users_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let user_id = get_required_str(params, "userId")?;
    let deleted = directory::delete_user(conn, &user_id)?;
    Ok(json!({ "userId": user_id, "deletedAttendance": deleted }))
}

fn subjects_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let subject_id = directory::upsert_subject(
        conn,
        SubjectInput {
            id: get_optional_str(params, "id"),
            branch_id: get_required_str(params, "branchId")?,
            semester: get_required_i64(params, "semester")?,
            code: get_optional_str(params, "code"),
            name: get_required_str(params, "name")?,
        },
    )?;
    Ok(json!({ "subjectId": subject_id }))
}

fn subjects_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value> {
    let branch_id = get_optional_str(params, "branchId");
    let semester = get_optional_i64(params, "semester")?;
    Ok(json!({ "subjects": directory::list_subjects(conn, branch_id.as_deref(), semester)? }))
}

type DirectoryOp = fn(&Connection, &serde_json::Value) -> Result<serde_json::Value>;

fn run(state: &mut AppState, req: &Request, op: DirectoryOp) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match op(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: DirectoryOp = match req.method.as_str() {
        "branches.upsert" => branches_upsert,
        "branches.list" => branches_list,
        "users.upsert" => users_upsert,
        "users.get" => users_get,
        "users.list" => users_list,
        "users.delete" => users_delete,
        "subjects.upsert" => subjects_upsert,
        "subjects.list" => subjects_list,
        _ => return None,
    };
    Some(run(state, req, op))
}
