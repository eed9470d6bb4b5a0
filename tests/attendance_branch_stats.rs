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

fn assert_all_zero(cells: &serde_json::Value) {
    for cell in cells.as_array().cloned().unwrap_or_default() {
        assert_eq!(cell["totalRecords"], json!(0), "{}", cell);
        assert_eq!(cell["presentRecords"], json!(0), "{}", cell);
        assert_eq!(cell["percentage"], json!(0), "{}", cell);
    }
}

#[test]
fn branch_stats_without_records_are_zero_everywhere() {
    let workspace = temp_dir("attendanced-branch-stats-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_two_branches(&mut stdin, &mut reader);

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.branchStats",
        json!({ "requesterId": "admin" }),
    );
    assert_eq!(stats["byBranch"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(stats["bySemester"].as_array().map(|a| a.len()), Some(8));
    assert_eq!(stats["byBranchAndSemester"].as_array().map(|a| a.len()), Some(16));
    assert_all_zero(&stats["byBranch"]);
    assert_all_zero(&stats["bySemester"]);
    assert_all_zero(&stats["byBranchAndSemester"]);
}

#[test]
fn branch_stats_rates_per_branch_semester_and_cell() {
    let workspace = temp_dir("attendanced-branch-stats");
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

    let marks = [
        ("t-cse", "s-cse", "ds", "2024-03-04", true),
        ("t-cse", "s-cse", "ds", "2024-03-05", false),
        ("t-ece", "s-ece", "circuits", "2024-03-05", true),
    ];
    for (i, (teacher, student, subject, date, present)) in marks.into_iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.record",
            json!({ "teacherId": teacher, "studentId": student, "subjectId": subject, "date": date, "present": present }),
        );
    }

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.branchStats",
        json!({ "requesterId": "admin" }),
    );

    let by_code = |code: &str| {
        stats["byBranch"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .find(|b| b["code"] == json!(code))
            .expect("branch row")
    };
    assert_eq!(by_code("CSE")["percentage"], json!(50));
    assert_eq!(by_code("CSE")["totalRecords"], json!(2));
    assert_eq!(by_code("ECE")["percentage"], json!(100));

    for s in stats["bySemester"].as_array().cloned().unwrap_or_default() {
        if s["semester"] == json!(3) {
            assert_eq!(s["totalRecords"], json!(3));
            assert_eq!(s["presentRecords"], json!(2));
            assert_eq!(s["percentage"], json!(67));
        } else {
            assert_eq!(s["percentage"], json!(0));
            assert_eq!(s["totalRecords"], json!(0));
        }
    }

    for cell in stats["byBranchAndSemester"].as_array().cloned().unwrap_or_default() {
        let expected = match (cell["code"].as_str(), cell["semester"].as_i64()) {
            (Some("CSE"), Some(3)) => 50,
            (Some("ECE"), Some(3)) => 100,
            _ => 0,
        };
        assert_eq!(cell["percentage"], json!(expected), "{}", cell);
    }
}
