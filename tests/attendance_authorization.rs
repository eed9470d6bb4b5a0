use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .env_remove("ATTENDANCED_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected failure: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// CSE and ECE branches, one teacher and one semester-3 student in each,
/// subject `ds` (CSE, semester 3) and an admin `admin`.
fn seed_two_branches(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let cse = request_ok(
        stdin,
        reader,
        "seed-b1",
        "branches.upsert",
        json!({ "code": "CSE", "name": "Computer Science" }),
    );
    let cse_id = cse.get("branchId").and_then(|v| v.as_str()).expect("branchId").to_string();
    let _ = request_ok(
        stdin,
        reader,
        "seed-b2",
        "branches.upsert",
        json!({ "code": "ECE", "name": "Electronics" }),
    );
    let users = [
        json!({ "id": "t-cse", "name": "CSE Teacher", "role": "teacher", "branchCode": "CSE" }),
        json!({ "id": "t-ece", "name": "ECE Teacher", "role": "teacher", "branchCode": "ECE" }),
        json!({ "id": "s-cse", "name": "CSE Student", "role": "student", "branchCode": "CSE", "semester": 3 }),
        json!({ "id": "s-ece", "name": "ECE Student", "role": "student", "branchCode": "ECE", "semester": 3 }),
        json!({ "id": "admin", "name": "Registrar", "role": "admin" }),
    ];
    for (i, u) in users.into_iter().enumerate() {
        let _ = request_ok(stdin, reader, &format!("seed-u{}", i), "users.upsert", u);
    }
    let _ = request_ok(
        stdin,
        reader,
        "seed-s1",
        "subjects.upsert",
        json!({ "id": "ds", "branchId": cse_id, "semester": 3, "code": "DS", "name": "Data Structures" }),
    );
}

#[test]
fn cross_branch_marking_is_forbidden_and_writes_nothing() {
    let workspace = temp_dir("attendanced-auth-cross-branch");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_two_branches(&mut stdin, &mut reader);

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.record",
        json!({ "teacherId": "t-ece", "studentId": "s-cse", "subjectId": "ds", "date": "2024-03-05", "present": true }),
    );
    assert_eq!(error_code(&resp), "forbidden");

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.studentHistory",
        json!({ "requesterId": "admin", "studentId": "s-cse" }),
    );
    assert_eq!(history["records"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn teacher_resolution_failures_are_reported() {
    let workspace = temp_dir("attendanced-auth-teacher");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_two_branches(&mut stdin, &mut reader);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.upsert",
        json!({ "id": "t-none", "name": "Unassigned", "role": "teacher" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.upsert",
        json!({ "id": "t-ghost", "name": "Ghost Branch", "role": "teacher", "branchCode": "MECH" }),
    );

    let mark = |teacher: &str| {
        json!({ "teacherId": teacher, "studentId": "s-cse", "subjectId": "ds", "date": "2024-03-05", "present": true })
    };

    let no_branch = request(&mut stdin, &mut reader, "4", "attendance.record", mark("t-none"));
    assert_eq!(error_code(&no_branch), "forbidden");
    assert_eq!(no_branch["error"]["message"], json!("no branch assigned"));

    let missing_branch = request(&mut stdin, &mut reader, "5", "attendance.record", mark("t-ghost"));
    assert_eq!(error_code(&missing_branch), "not_found");
    assert_eq!(missing_branch["error"]["details"]["entity"], json!("branch"));

    let unknown = request(&mut stdin, &mut reader, "6", "attendance.record", mark("t-missing"));
    assert_eq!(error_code(&unknown), "not_found");
    assert_eq!(unknown["error"]["details"]["entity"], json!("teacher"));

    let student_as_teacher = request(&mut stdin, &mut reader, "7", "attendance.record", mark("s-cse"));
    assert_eq!(error_code(&student_as_teacher), "forbidden");
}

#[test]
fn student_views_are_limited_to_self_branch_teachers_and_admins() {
    let workspace = temp_dir("attendanced-auth-view");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_two_branches(&mut stdin, &mut reader);

    let allowed = ["s-cse", "t-cse", "admin"];
    for (i, requester) in allowed.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("ok{}", i),
            "attendance.studentSummary",
            json!({ "requesterId": requester, "studentId": "s-cse" }),
        );
    }

    let denied = ["s-ece", "t-ece"];
    for (i, requester) in denied.iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("deny{}", i),
            "attendance.studentHistory",
            json!({ "requesterId": requester, "studentId": "s-cse" }),
        );
        assert_eq!(error_code(&resp), "forbidden", "{} should be denied", requester);
    }

    let stats = request(
        &mut stdin,
        &mut reader,
        "stats",
        "attendance.branchStats",
        json!({ "requesterId": "t-cse" }),
    );
    assert_eq!(error_code(&stats), "forbidden");
}

#[test]
fn subjects_of_another_branch_cannot_be_marked_or_listed() {
    let workspace = temp_dir("attendanced-auth-foreign-subject");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_two_branches(&mut stdin, &mut reader);
    let branches = request_ok(&mut stdin, &mut reader, "2", "branches.list", json!({}));
    let ece_id = branches["branches"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .find(|b| b["code"] == json!("ECE"))
        .and_then(|b| b["id"].as_str().map(|s| s.to_string()))
        .expect("ECE id");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.upsert",
        json!({ "id": "circuits", "branchId": ece_id, "semester": 3, "name": "Circuits" }),
    );

    let record = request(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.record",
        json!({ "teacherId": "t-cse", "studentId": "s-cse", "subjectId": "circuits", "date": "2024-03-05", "present": true }),
    );
    assert_eq!(error_code(&record), "forbidden");
    assert_eq!(record["error"]["message"], json!("subject belongs to a different branch"));

    let roster = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.roster",
        json!({ "teacherId": "t-cse", "date": "2024-03-05", "semester": 3, "subjectId": "circuits" }),
    );
    assert_eq!(error_code(&roster), "forbidden");

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.studentHistory",
        json!({ "requesterId": "admin", "studentId": "s-cse" }),
    );
    assert_eq!(history["records"].as_array().map(|a| a.len()), Some(0));

    let own = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.roster",
        json!({ "teacherId": "t-ece", "date": "2024-03-05", "semester": 3, "subjectId": "circuits" }),
    );
    assert_eq!(own["totalStudents"], json!(1));
}
