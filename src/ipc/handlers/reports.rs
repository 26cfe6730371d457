use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_str, get_required_text, get_student_id, with_roster, write_export, RosterFn,
};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::roster::Roster;
use serde_json::json;

fn stats_student(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let Some(summary) = roster.attendance_summary(&student_id) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let percentage = roster
        .student(&student_id)
        .map(|s| s.attendance_percentage())
        .unwrap_or(0.0);
    Ok(json!({
        "studentId": student_id,
        "summary": summary,
        "attendancePercentage": percentage,
    }))
}

fn stats_class(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_text(params, "className")?;
    Ok(json!({
        "className": class_name,
        "studentCount": roster.students_in_class(&class_name).len(),
        "attendancePercentage": roster.class_percentage(&class_name),
    }))
}

fn stats_overall(
    roster: &mut Roster,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "studentCount": roster.len(),
        "totalClasses": roster.total_classes(),
        "overallPercentage": roster.overall_percentage(),
        "todayPercentage": roster.today_percentage(),
        "today": roster.current_date(),
    }))
}

fn out_path(params: &serde_json::Value) -> Option<String> {
    get_optional_str(params, "outPath").filter(|p| !p.is_empty())
}

/// Returns the report text, also saving it when an output path is given.
fn report_result(text: String, out: Option<String>) -> Result<serde_json::Value, HandlerErr> {
    match out {
        Some(path) => {
            write_export(&path, &text)?;
            Ok(json!({ "text": text, "path": path }))
        }
        None => Ok(json!({ "text": text })),
    }
}

fn reports_individual(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_student_id(params)?;
    let out = out_path(params);
    if out.is_some() && roster.student(&student_id).is_none() {
        return Err(HandlerErr::not_found("student not found"));
    }
    report_result(report::individual_report(roster, &student_id), out)
}

fn reports_class(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_text(params, "className")?;
    let out = out_path(params);
    if out.is_some() && roster.students_in_class(&class_name).is_empty() {
        return Err(HandlerErr::not_found("no students in class"));
    }
    report_result(report::class_report(roster, &class_name), out)
}

fn reports_overall(
    roster: &mut Roster,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    report_result(report::overall_report(roster), out_path(params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: RosterFn = match req.method.as_str() {
        "stats.student" => stats_student,
        "stats.class" => stats_class,
        "stats.overall" => stats_overall,
        "reports.individual" => reports_individual,
        "reports.class" => reports_class,
        "reports.overall" => reports_overall,
        _ => return None,
    };
    Some(with_roster(state, req, f))
}
