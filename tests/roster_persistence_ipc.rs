use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl Sidecar {
    fn spawn(workspace_env: Option<&Path>) -> Self {
        let exe = env!("CARGO_BIN_EXE_rollcalld");
        let mut cmd = Command::new(exe);
        cmd.env_remove("ROLLCALLD_WORKSPACE");
        if let Some(ws) = workspace_env {
            cmd.env("ROLLCALLD_WORKSPACE", ws);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn rollcalld");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    fn call(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({ "id": id, "method": method, "params": params });
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{}", payload).expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    fn call_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.call(id, method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Closes stdin and waits for a clean exit.
    fn shutdown(mut self) {
        drop(self.stdin.take());
        let status = self.child.wait().expect("wait for sidecar");
        assert!(status.success(), "sidecar exited with {}", status);
    }
}

fn student_ids(list: &serde_json::Value) -> Vec<String> {
    list.get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()))
        .collect()
}

fn seed(sc: &mut Sidecar) {
    for (id, name, class_name) in [
        ("S1", "Ada Lovelace", "Engineering"),
        ("S2", "Grace Hopper", "Engineering"),
    ] {
        sc.call_ok(
            &format!("create-{}", id),
            "students.create",
            json!({
                "studentId": id,
                "name": name,
                "email": format!("{}@school.test", id.to_lowercase()),
                "className": class_name
            }),
        );
    }
    sc.call_ok(
        "mark",
        "attendance.markClass",
        json!({
            "className": "Engineering",
            "date": "01-09-2025",
            "entries": { "S1": true, "S2": false }
        }),
    );
    sc.call_ok(
        "mark2",
        "attendance.mark",
        json!({ "studentId": "S1", "date": "02-09-2025", "present": false }),
    );
}

#[test]
fn restart_reloads_identical_roster() {
    let workspace = temp_dir("rollcall-persist");

    let mut first = Sidecar::spawn(None);
    first.call_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed(&mut first);
    let before = first.call_ok("list", "students.list", json!({}));
    first.shutdown();

    let mut second = Sidecar::spawn(None);
    let sel = second.call_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(sel.get("studentCount").and_then(|v| v.as_u64()), Some(2));
    let after = second.call_ok("list", "students.list", json!({}));
    assert_eq!(before, after);
    assert_eq!(student_ids(&after), vec!["S1", "S2"]);
    let s1 = &after["students"][0];
    assert_eq!(s1["attendance"]["01-09-2025"], json!(true));
    assert_eq!(s1["attendance"]["02-09-2025"], json!(false));
    second.shutdown();

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_from_environment_is_opened_at_startup() {
    let workspace = temp_dir("rollcall-env-ws");

    let mut first = Sidecar::spawn(Some(&workspace));
    let health = first.call_ok("h", "health", json!({}));
    let expected = workspace.to_string_lossy().to_string();
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(expected.as_str())
    );
    seed(&mut first);
    first.shutdown();

    let mut second = Sidecar::spawn(Some(&workspace));
    let list = second.call_ok("list", "students.list", json!({}));
    assert_eq!(student_ids(&list), vec!["S1", "S2"]);
    second.shutdown();

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn backup_import_restores_removed_student() {
    let workspace = temp_dir("rollcall-backup-ipc");
    let out_dir = temp_dir("rollcall-backup-ipc-out");
    let bundle = out_dir.join("roster.rollcall.zip");

    let mut sc = Sidecar::spawn(None);
    sc.call_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed(&mut sc);

    let export = sc.call_ok(
        "exp",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        export.get("bundleFormat").and_then(|v| v.as_str()),
        Some("rollcall-workspace-v1")
    );
    assert_eq!(export.get("entryCount").and_then(|v| v.as_u64()), Some(2));

    sc.call_ok("del", "students.delete", json!({ "studentId": "S2" }));
    let list = sc.call_ok("list", "students.list", json!({}));
    assert_eq!(student_ids(&list), vec!["S1"]);

    let import = sc.call_ok(
        "imp",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        import.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("rollcall-workspace-v1")
    );
    assert_eq!(import.get("studentCount").and_then(|v| v.as_u64()), Some(2));

    let list = sc.call_ok("list", "students.list", json!({}));
    assert_eq!(student_ids(&list), vec!["S1", "S2"]);
    let got = sc.call_ok(
        "get",
        "attendance.get",
        json!({ "studentId": "S2", "date": "01-09-2025" }),
    );
    assert_eq!(got.get("recorded").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(got.get("present").and_then(|v| v.as_bool()), Some(false));

    let missing = sc.call(
        "imp-missing",
        "backup.importWorkspaceBundle",
        json!({ "inPath": out_dir.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(
        missing.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );
    // Roster still usable after a rejected import.
    sc.call_ok("list-after", "students.list", json!({}));

    let notes = out_dir.join("notes.txt");
    std::fs::write(&notes, "hello, this is not a database").expect("write notes");
    let rejected = sc.call(
        "imp-notes",
        "backup.importWorkspaceBundle",
        json!({ "inPath": notes.to_string_lossy() }),
    );
    assert_eq!(
        rejected.pointer("/error/code").and_then(|v| v.as_str()),
        Some("io_failed")
    );
    let list = sc.call_ok("list-notes", "students.list", json!({}));
    assert_eq!(student_ids(&list), vec!["S1", "S2"]);
    sc.shutdown();

    let mut reopened = Sidecar::spawn(Some(&workspace));
    let list = reopened.call_ok("list-reopen", "students.list", json!({}));
    assert_eq!(student_ids(&list), vec!["S1", "S2"]);
    reopened.shutdown();

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn class_csv_export_writes_recorded_rows() {
    let workspace = temp_dir("rollcall-csv");
    let out_path = workspace.join("exports").join("engineering.csv");

    let mut sc = Sidecar::spawn(None);
    sc.call_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed(&mut sc);
    let res = sc.call_ok(
        "csv",
        "exchange.exportClassCsv",
        json!({ "className": "Engineering", "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(res.get("rowsExported").and_then(|v| v.as_u64()), Some(3));
    sc.shutdown();

    let text = std::fs::read_to_string(&out_path).expect("read csv");
    assert_eq!(
        text,
        "student_id,name,date,present\n\
         S1,Ada Lovelace,01-09-2025,1\n\
         S1,Ada Lovelace,02-09-2025,0\n\
         S2,Grace Hopper,01-09-2025,0\n"
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn roster_json_export_and_clear() {
    let workspace = temp_dir("rollcall-json");
    let out_path = workspace.join("exports").join("attendance_data.json");

    let mut sc = Sidecar::spawn(Some(&workspace));
    seed(&mut sc);
    let res = sc.call_ok(
        "json",
        "exchange.exportRosterJson",
        json!({ "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(res.get("studentsExported").and_then(|v| v.as_u64()), Some(2));

    let text = std::fs::read_to_string(&out_path).expect("read json");
    let exported: serde_json::Value = serde_json::from_str(&text).expect("parse json");
    let rows = exported.as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "S1");
    assert_eq!(rows[0]["className"], "Engineering");
    assert_eq!(rows[0]["attendance"]["02-09-2025"], json!(false));
    assert_eq!(rows[1]["attendance"]["01-09-2025"], json!(false));

    let cleared = sc.call_ok("clear", "students.clear", json!({}));
    assert_eq!(cleared.get("removed").and_then(|v| v.as_u64()), Some(2));
    let list = sc.call_ok("list", "students.list", json!({}));
    assert!(student_ids(&list).is_empty());
    sc.shutdown();

    let mut second = Sidecar::spawn(Some(&workspace));
    let list = second.call_ok("list", "students.list", json!({}));
    assert!(student_ids(&list).is_empty());
    second.shutdown();

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reports_are_saved_when_out_path_given() {
    let workspace = temp_dir("rollcall-report-files");
    let reports = workspace.join("reports");

    let mut sc = Sidecar::spawn(Some(&workspace));
    seed(&mut sc);

    let individual = reports.join("S1.txt");
    let res = sc.call_ok(
        "ri",
        "reports.individual",
        json!({ "studentId": "S1", "outPath": individual.to_string_lossy() }),
    );
    let text = res.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
    assert!(text.contains("Attendance Percentage: 50.0%"));
    assert_eq!(std::fs::read_to_string(&individual).expect("read report"), text);

    let class_file = reports.join("engineering.txt");
    sc.call_ok(
        "rc",
        "reports.class",
        json!({ "className": "Engineering", "outPath": class_file.to_string_lossy() }),
    );
    let saved = std::fs::read_to_string(&class_file).expect("read class report");
    assert!(saved.starts_with("=== Class Attendance Report ===\n"));

    let overall_file = reports.join("overall.txt");
    sc.call_ok(
        "ro",
        "reports.overall",
        json!({ "outPath": overall_file.to_string_lossy() }),
    );
    assert!(overall_file.is_file());

    let missing = reports.join("ghost.txt");
    let res = sc.call(
        "ghost",
        "reports.individual",
        json!({ "studentId": "ghost", "outPath": missing.to_string_lossy() }),
    );
    assert_eq!(
        res.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );
    assert!(!missing.exists());
    sc.shutdown();

    let _ = std::fs::remove_dir_all(workspace);
}
