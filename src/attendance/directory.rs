//! Branch, user and subject directories.
//!
//! The attendance core only reads these; the write helpers exist so the
//! daemon can be seeded by the portal (and by tests) through IPC.

use super::error::{AttendanceError, Result};
use super::model::{check_semester, Branch, Role, Subject, User};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        name: r.get(1)?,
        role: r.get(2)?,
        branch_code: r.get(3)?,
        semester: r.get(4)?,
    })
}

fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        branch_id: r.get(1)?,
        semester: r.get(2)?,
        code: r.get(3)?,
        name: r.get(4)?,
    })
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, name, role, branch_code, semester FROM users WHERE id = ?",
            [user_id],
            user_from_row,
        )
        .optional()?)
}

pub fn get_branch_by_code(conn: &Connection, code: &str) -> Result<Option<Branch>> {
    Ok(conn
        .query_row(
            "SELECT id, code, name FROM branches WHERE code = ?",
            [code],
            |r| {
                Ok(Branch {
                    id: r.get(0)?,
                    code: r.get(1)?,
                    name: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> Result<Option<Subject>> {
    Ok(conn
        .query_row(
            "SELECT id, branch_id, semester, code, name FROM subjects WHERE id = ?",
            [subject_id],
            subject_from_row,
        )
        .optional()?)
}

pub fn list_branches(conn: &Connection) -> Result<Vec<Branch>> {
    let mut stmt = conn.prepare("SELECT id, code, name FROM branches ORDER BY code")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Branch {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Students enrolled in a branch and semester, ordered by id.
pub fn list_students(conn: &Connection, branch_code: &str, semester: i64) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, role, branch_code, semester
         FROM users
         WHERE role = 'student' AND branch_code = ? AND semester = ?
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map((branch_code, semester), user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub branch_code: Option<String>,
    pub semester: Option<i64>,
}

pub fn list_users(conn: &Connection, filter: &UserFilter) -> Result<Vec<User>> {
    let mut sql = String::from("SELECT id, name, role, branch_code, semester FROM users WHERE 1 = 1");
    let mut bind: Vec<Value> = Vec::new();
    if let Some(role) = filter.role {
        sql.push_str(" AND role = ?");
        bind.push(Value::Text(role.as_str().to_string()));
    }
    if let Some(code) = &filter.branch_code {
        sql.push_str(" AND branch_code = ?");
        bind.push(Value::Text(code.clone()));
    }
    if let Some(semester) = filter.semester {
        sql.push_str(" AND semester = ?");
        bind.push(Value::Integer(semester));
    }
    sql.push_str(" ORDER BY name, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_subjects(
    conn: &Connection,
    branch_id: Option<&str>,
    semester: Option<i64>,
) -> Result<Vec<Subject>> {
    let mut sql = String::from("SELECT id, branch_id, semester, code, name FROM subjects WHERE 1 = 1");
    let mut bind: Vec<Value> = Vec::new();
    if let Some(b) = branch_id {
        sql.push_str(" AND branch_id = ?");
        bind.push(Value::Text(b.to_string()));
    }
    if let Some(s) = semester {
        sql.push_str(" AND semester = ?");
        bind.push(Value::Integer(s));
    }
    sql.push_str(" ORDER BY semester, name, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), subject_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Branches are keyed by code: upserting an existing code renames it and
/// keeps its id.
pub fn upsert_branch(conn: &Connection, id: Option<String>, code: &str, name: &str) -> Result<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AttendanceError::validation("code", "code must not be empty"));
    }
    if let Some(id) = id.as_deref() {
        let taken: Option<String> = conn
            .query_row("SELECT code FROM branches WHERE id = ?", [id], |r| r.get(0))
            .optional()?;
        if let Some(existing) = taken.filter(|c| c != code) {
            return Err(AttendanceError::validation(
                "id",
                format!("branch id {id} is already used by code {existing}"),
            ));
        }
    }
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let branch_id: String = conn.query_row(
        "INSERT INTO branches(id, code, name) VALUES(?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET name = excluded.name
         RETURNING id",
        (&id, code, name.trim()),
        |r| r.get(0),
    )?;
    info!(branch_id = %branch_id, code, "branch upserted");
    Ok(branch_id)
}

#[derive(Debug)]
pub struct UserInput {
    pub id: Option<String>,
    pub name: String,
    pub role: Role,
    pub branch_code: Option<String>,
    pub semester: Option<i64>,
}

/// Creates or replaces a user. Existing attendance rows keep the semester
/// they were marked under even when the student's semester changes here.
pub fn upsert_user(conn: &Connection, input: UserInput) -> Result<String> {
    if input.name.trim().is_empty() {
        return Err(AttendanceError::validation("name", "name must not be empty"));
    }
    let branch_code = input
        .branch_code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(s) = input.semester {
        check_semester("semester", s)?;
    }
    if input.role == Role::Student {
        if branch_code.is_none() {
            return Err(AttendanceError::validation(
                "branchCode",
                "students must belong to a branch",
            ));
        }
        if input.semester.is_none() {
            return Err(AttendanceError::validation(
                "semester",
                "students must carry a semester",
            ));
        }
    }

    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users(id, name, role, branch_code, semester, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           role = excluded.role,
           branch_code = excluded.branch_code,
           semester = excluded.semester,
           updated_at = excluded.updated_at",
        (
            &id,
            input.name.trim(),
            input.role.as_str(),
            &branch_code,
            input.semester,
            &now,
        ),
    )?;
    info!(user_id = %id, role = input.role.as_str(), "user upserted");
    Ok(id)
}

/// Deletes a user account. A student's attendance rows go with it.
pub fn delete_user(conn: &Connection, user_id: &str) -> Result<usize> {
    if get_user(conn, user_id)?.is_none() {
        return Err(AttendanceError::not_found("user", user_id));
    }
    let tx = conn.unchecked_transaction()?;
    let deleted = tx.execute("DELETE FROM attendance WHERE student_id = ?", [user_id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    tx.commit()?;
    info!(user_id, deleted_attendance = deleted, "user deleted");
    Ok(deleted)
}

#[derive(Debug)]
pub struct SubjectInput {
    pub id: Option<String>,
    pub branch_id: String,
    pub semester: i64,
    pub code: Option<String>,
    pub name: String,
}

pub fn upsert_subject(conn: &Connection, input: SubjectInput) -> Result<String> {
    if input.name.trim().is_empty() {
        return Err(AttendanceError::validation("name", "name must not be empty"));
    }
    check_semester("semester", input.semester)?;
    let branch_exists = conn
        .query_row(
            "SELECT 1 FROM branches WHERE id = ?",
            [&input.branch_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if !branch_exists {
        return Err(AttendanceError::not_found("branch", input.branch_id));
    }

    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    conn.execute(
        "INSERT INTO subjects(id, branch_id, semester, code, name)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           branch_id = excluded.branch_id,
           semester = excluded.semester,
           code = excluded.code,
           name = excluded.name",
        (
            &id,
            &input.branch_id,
            input.semester,
            &input.code,
            input.name.trim(),
        ),
    )?;
    info!(subject_id = %id, branch_id = %input.branch_id, "subject upserted");
    Ok(id)
}
