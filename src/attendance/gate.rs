//! Who may record or view what.
//!
//! Every check takes the acting user's id explicitly; nothing here reads a
//! session or any other process-wide identity.

use super::directory;
use super::error::{AttendanceError, Result};
use super::model::{Branch, Role, Subject, User};
use rusqlite::Connection;
use tracing::warn;

/// A teacher together with the branch they act for.
#[derive(Debug, Clone)]
pub struct TeacherScope {
    pub teacher: User,
    pub branch: Branch,
}

pub fn resolve_teacher(conn: &Connection, teacher_id: &str) -> Result<TeacherScope> {
    let Some(teacher) = directory::get_user(conn, teacher_id)? else {
        return Err(AttendanceError::not_found("teacher", teacher_id));
    };
    if teacher.role != Role::Teacher {
        warn!(user_id = teacher_id, role = teacher.role.as_str(), "non-teacher used a teacher operation");
        return Err(AttendanceError::forbidden("only teachers can record or list attendance"));
    }
    let Some(code) = teacher.branch_code.clone() else {
        warn!(teacher_id, "teacher has no branch assigned");
        return Err(AttendanceError::forbidden("no branch assigned"));
    };
    let Some(branch) = directory::get_branch_by_code(conn, &code)? else {
        // The directory points at a branch that does not exist.
        warn!(teacher_id, branch_code = %code, "teacher branch missing from directory");
        return Err(AttendanceError::not_found("branch", code));
    };
    Ok(TeacherScope { teacher, branch })
}

/// Resolves a student the scoped teacher is allowed to mark.
pub fn resolve_student_in_scope(
    conn: &Connection,
    scope: &TeacherScope,
    student_id: &str,
) -> Result<User> {
    let student = match directory::get_user(conn, student_id)? {
        Some(u) if u.role == Role::Student => u,
        _ => return Err(AttendanceError::not_found("student", student_id)),
    };
    if student.branch_code.as_deref() != Some(scope.branch.code.as_str()) {
        warn!(
            teacher_id = %scope.teacher.id,
            student_id,
            teacher_branch = %scope.branch.code,
            "cross-branch attendance access denied"
        );
        return Err(AttendanceError::forbidden(
            "student belongs to a different branch",
        ));
    }
    Ok(student)
}

/// Resolves a subject taught in the scoped teacher's branch.
pub fn resolve_subject_in_scope(
    conn: &Connection,
    scope: &TeacherScope,
    subject_id: &str,
) -> Result<Subject> {
    let Some(subject) = directory::get_subject(conn, subject_id)? else {
        return Err(AttendanceError::not_found("subject", subject_id));
    };
    if subject.branch_id != scope.branch.id {
        warn!(
            teacher_id = %scope.teacher.id,
            subject_id,
            teacher_branch = %scope.branch.code,
            "cross-branch subject access denied"
        );
        return Err(AttendanceError::forbidden(
            "subject belongs to a different branch",
        ));
    }
    Ok(subject)
}

/// Resolves `student_id` for reading by `requester_id`: the student
/// themself, a teacher of the same branch, or an admin.
pub fn authorize_student_view(
    conn: &Connection,
    requester_id: &str,
    student_id: &str,
) -> Result<User> {
    let Some(requester) = directory::get_user(conn, requester_id)? else {
        return Err(AttendanceError::not_found("requester", requester_id));
    };
    let student = match directory::get_user(conn, student_id)? {
        Some(u) if u.role == Role::Student => u,
        _ => return Err(AttendanceError::not_found("student", student_id)),
    };

    let allowed = match requester.role {
        Role::Admin => true,
        Role::Student => requester.id == student.id,
        Role::Teacher => {
            requester.branch_code.is_some() && requester.branch_code == student.branch_code
        }
    };
    if !allowed {
        warn!(requester_id, student_id, "attendance view denied");
        return Err(AttendanceError::forbidden(
            "not permitted to view this student's attendance",
        ));
    }
    Ok(student)
}

pub fn require_admin(conn: &Connection, requester_id: &str) -> Result<User> {
    match directory::get_user(conn, requester_id)? {
        Some(u) if u.role == Role::Admin => Ok(u),
        Some(_) => {
            warn!(requester_id, "admin-only operation denied");
            Err(AttendanceError::forbidden("admin access required"))
        }
        None => Err(AttendanceError::not_found("requester", requester_id)),
    }
}
