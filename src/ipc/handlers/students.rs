use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_required_text, get_student_id, student_json,
    students_json, with_roster, RosterFn,
};
use crate::ipc::types::{AppState, Request};
use crate::roster::{Roster, StudentPatch};
use crate::student::Student;
use serde_json::json;

fn students_list(
    roster: &mut Roster,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "students": students_json(roster.students()) }))
}

fn students_get(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let student = roster
        .student(&student_id)
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    Ok(json!({ "student": student_json(student) }))
}

fn students_create(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let name = get_required_text(params, "name")?;
    let email = get_optional_str(params, "email").unwrap_or_default();
    let class_name = get_required_text(params, "className")?;

    if !roster.add_student(Student::new(student_id.clone(), name, email, class_name)) {
        return Err(HandlerErr::new("duplicate_id", "student id already exists")
            .with_details(json!({ "studentId": student_id })));
    }
    let student = roster
        .student(&student_id)
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    Ok(json!({ "student": student_json(student) }))
}

fn students_update(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let patch = StudentPatch {
        name: get_optional_str(params, "name"),
        email: get_optional_str(params, "email"),
        class_name: get_optional_str(params, "className"),
    };
    if patch.name.as_deref() == Some("") || patch.class_name.as_deref() == Some("") {
        return Err(HandlerErr::bad_params("name/className must not be empty"));
    }
    if !roster.update_student(&student_id, patch) {
        return Err(HandlerErr::not_found("student not found"));
    }
    let student = roster
        .student(&student_id)
        .ok_or_else(|| HandlerErr::not_found("student not found"))?;
    Ok(json!({ "student": student_json(student) }))
}

fn students_delete(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    if !roster.remove_student(&student_id) {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_clear(
    roster: &mut Roster,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "removed": roster.clear() }))
}

fn students_search(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let query = get_required_str(params, "query")?;
    Ok(json!({ "students": students_json(roster.search(&query)) }))
}

fn classes_list(
    roster: &mut Roster,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let classes: Vec<serde_json::Value> = roster
        .classes()
        .into_iter()
        .map(|name| {
            json!({
                "name": name,
                "studentCount": roster.students_in_class(&name).len(),
            })
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn classes_students(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_text(params, "className")?;
    Ok(json!({ "students": students_json(roster.students_in_class(&class_name)) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: RosterFn = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.clear" => students_clear,
        "students.search" => students_search,
        "classes.list" => classes_list,
        "classes.students" => classes_students,
        _ => return None,
    };
    Some(with_roster(state, req, f))
}
