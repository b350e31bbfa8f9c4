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
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

#[test]
fn subject_and_general_attendance_percentages() {
    let workspace = temp_dir("rollbook-attendance-s1");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "session.begin", json!({ "role": "admin" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "rollNo": "101", "name": "Asha Rao", "department": "CS", "semester": 3 }),
    );
    request_ok(&mut stdin, &mut reader, "4", "session.begin", json!({ "role": "teacher" }));

    for (i, (date, status, subject)) in [
        ("2024-03-01", "P", "Math"),
        ("2024-03-02", "A", "Math"),
        ("2024-03-03", "P", ""),
    ]
    .iter()
    .enumerate()
    {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("mark-{}", i),
            "attendance.mark",
            json!({
                "date": date,
                "subject": subject,
                "entries": [{ "rollNo": "101", "status": status }],
            }),
        );
        assert_eq!(res["written"], 1);
    }

    let overall = request_ok(&mut stdin, &mut reader, "5", "attendance.percentage", json!({ "rollNo": "101" }));
    assert_eq!(overall["percentage"].as_f64(), Some(66.67));
    assert_eq!(overall["band"], "Average");

    let math = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.percentage",
        json!({ "rollNo": "101", "subject": "Math" }),
    );
    assert_eq!(math["percentage"].as_f64(), Some(50.0));
    assert_eq!(math["tally"]["total"], 2);
    assert_eq!(math["band"], "Average");

    let subjects = request_ok(&mut stdin, &mut reader, "7", "attendance.subjects", json!({ "rollNo": "101" }));
    assert_eq!(subjects["subjects"], json!(["Math"]));

    let dates = request_ok(&mut stdin, &mut reader, "8", "attendance.dates", json!({}));
    assert_eq!(dates["dates"], json!(["2024-03-01", "2024-03-02", "2024-03-03"]));

    let summary = request_ok(&mut stdin, &mut reader, "9", "attendance.summary", json!({ "rollNo": "101" }));
    assert_eq!(summary["overall"]["present"], 2);
    assert_eq!(summary["subjects"][0]["subject"], "Math");

    let text = std::fs::read_to_string(workspace.join("attendance.txt")).expect("read attendance file");
    assert_eq!(
        text,
        "101|2024-03-01|P|Math\n101|2024-03-02|A|Math\n101|2024-03-03|P|\n"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn mark_all_covers_every_registered_student() {
    let workspace = temp_dir("rollbook-attendance-markall");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "session.begin", json!({ "role": "teacher" }));

    let none = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.markAll",
        json!({ "date": "2024-04-01", "status": "P" }),
    );
    assert_eq!(error_code(&none), "not_found");

    request_ok(&mut stdin, &mut reader, "4", "session.begin", json!({ "role": "admin" }));
    for (i, roll) in ["1", "2", "3"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("add-{}", i),
            "students.create",
            json!({ "rollNo": roll, "name": "Student", "department": "EE", "semester": 1 }),
        );
    }
    request_ok(&mut stdin, &mut reader, "5", "session.begin", json!({ "role": "teacher" }));
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.markAll",
        json!({ "date": "2024-04-01", "subject": "Physics", "status": "absent" }),
    );
    assert_eq!(res["written"], 3);

    let listed = request_ok(&mut stdin, &mut reader, "7", "attendance.list", json!({ "date": "2024-04-01" }));
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r["status"] == "A" && r["subject"] == "Physics"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn mark_rejects_bad_input_without_writing() {
    let workspace = temp_dir("rollbook-attendance-reject");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "session.begin", json!({ "role": "admin" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "rollNo": "7", "name": "R. K. Das", "department": "ME", "semester": 2 }),
    );
    request_ok(&mut stdin, &mut reader, "4", "session.begin", json!({ "role": "teacher" }));

    let unknown = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({ "date": "2024-05-01", "entries": [{ "rollNo": "7", "status": "P" }, { "rollNo": "8", "status": "P" }] }),
    );
    assert_eq!(error_code(&unknown), "not_found");

    let bad_status = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({ "date": "2024-05-01", "entries": [{ "rollNo": "7", "status": "L" }] }),
    );
    assert_eq!(error_code(&bad_status), "invalid_field");
    assert_eq!(bad_status["error"]["details"]["field"], "status");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.mark",
        json!({ "date": "2024-02-30", "entries": [{ "rollNo": "7", "status": "P" }] }),
    );
    assert_eq!(error_code(&bad_date), "invalid_field");

    let piped = request(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.mark",
        json!({ "date": "2024-05-01", "subject": "Lab|A", "entries": [{ "rollNo": "7", "status": "P" }] }),
    );
    assert_eq!(error_code(&piped), "invalid_field");
    assert_eq!(piped["error"]["details"]["field"], "subject");

    assert!(!workspace.join("attendance.txt").exists());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
