use crate::dates;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;
use crate::student::Student;
use serde_json::json;
use std::path::Path;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed, non-empty string param.
pub fn get_required_text(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?.trim().to_string();
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

/// Student ids are stored trimmed; every lookup normalizes the same way.
pub fn get_student_id(params: &serde_json::Value) -> Result<String, HandlerErr> {
    get_required_text(params, "studentId")
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, key)?;
    let t = raw.trim();
    if !dates::is_valid_date(t) {
        return Err(HandlerErr::bad_params(format!("{} must be dd-MM-yyyy", key))
            .with_details(json!({ "value": raw })));
    }
    Ok(t.to_string())
}

/// Writes `text` to `path`, creating parent directories.
pub fn write_export(path: &str, text: &str) -> Result<(), HandlerErr> {
    let out = Path::new(path);
    let written = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
    .and_then(|()| std::fs::write(out, text));
    written.map_err(|e| {
        tracing::warn!(path, "export write failed: {e}");
        HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": path }))
    })
}

pub fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "name": s.name,
        "email": s.email,
        "className": s.class_name,
        "attendance": s.attendance,
        "totalClasses": s.total_classes(),
        "presentClasses": s.present_classes(),
        "absentClasses": s.absent_classes(),
        "attendancePercentage": s.attendance_percentage(),
    })
}

pub fn students_json<'a, I>(students: I) -> serde_json::Value
where
    I: IntoIterator<Item = &'a Student>,
{
    serde_json::Value::Array(students.into_iter().map(student_json).collect())
}

pub type RosterFn =
    fn(&mut Roster, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

/// Runs `f` against the open roster and wraps the outcome in a response.
pub fn with_roster<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&mut Roster, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(roster) = state.roster.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(roster, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}
