use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_str, get_required_bool, get_required_date, get_required_text, get_student_id,
    with_roster, RosterFn,
};
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;
use serde_json::json;
use std::collections::HashMap;

fn parse_entries(params: &serde_json::Value) -> Result<HashMap<String, bool>, HandlerErr> {
    let Some(obj) = params.get("entries").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let mut out: HashMap<String, bool> = HashMap::new();
    for (student_id, v) in obj {
        let Some(present) = v.as_bool() else {
            return Err(HandlerErr::bad_params("entries values must be booleans")
                .with_details(json!({ "studentId": student_id })));
        };
        out.insert(student_id.trim().to_string(), present);
    }
    Ok(out)
}

fn attendance_mark(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let date = get_required_date(params, "date")?;
    let present = get_required_bool(params, "present")?;
    if !roster.mark_attendance(&student_id, &date, present) {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn attendance_mark_class(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_text(params, "className")?;
    let date = get_required_date(params, "date")?;
    let entries = parse_entries(params)?;
    let marked = roster.mark_attendance_for_class(&class_name, &date, &entries);
    Ok(json!({ "marked": marked }))
}

fn attendance_get(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let date = get_required_date(params, "date")?;
    let Some(student) = roster.student(&student_id) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    Ok(json!({
        "recorded": student.attendance.contains_key(&date),
        "present": roster.attendance(&student_id, &date),
    }))
}

fn attendance_for_date(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let entries = match get_optional_str(params, "className") {
        Some(class_name) => roster.class_attendance_for_date(&class_name, &date),
        None => roster.attendance_for_date(&date),
    };
    Ok(json!({ "date": date, "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: RosterFn = match req.method.as_str() {
        "attendance.mark" => attendance_mark,
        "attendance.markClass" => attendance_mark_class,
        "attendance.get" => attendance_get,
        "attendance.forDate" => attendance_for_date,
        _ => return None,
    };
    Some(with_roster(state, req, f))
}
