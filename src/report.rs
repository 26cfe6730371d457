use crate::dates;
use crate::roster::Roster;
use crate::student::format_percent;
use std::fmt::Write as _;

pub fn individual_report(roster: &Roster, student_id: &str) -> String {
    let Some(s) = roster.student(student_id) else {
        return "Student not found.".to_string();
    };
    let mut out = String::new();
    out.push_str("=== Individual Attendance Report ===\n");
    let _ = writeln!(out, "Student ID: {}", s.id);
    let _ = writeln!(out, "Name: {}", s.name);
    let _ = writeln!(out, "Email: {}", s.email);
    let _ = writeln!(out, "Class: {}", s.class_name);
    let _ = writeln!(out, "Total Classes: {}", s.total_classes());
    let _ = writeln!(out, "Present Classes: {}", s.present_classes());
    let _ = writeln!(out, "Absent Classes: {}", s.absent_classes());
    let _ = writeln!(
        out,
        "Attendance Percentage: {}",
        format_percent(s.attendance_percentage())
    );
    out
}

pub fn class_report(roster: &Roster, class_name: &str) -> String {
    let students = roster.students_in_class(class_name);
    if students.is_empty() {
        return format!("No students found in class: {}", class_name);
    }
    let mut out = String::new();
    out.push_str("=== Class Attendance Report ===\n");
    let _ = writeln!(out, "Class: {}", class_name);
    let _ = writeln!(out, "Total Students: {}", students.len());
    let _ = writeln!(
        out,
        "Average Attendance: {}\n",
        format_percent(roster.class_percentage(class_name))
    );
    out.push_str("Student Details:\n");
    for s in students {
        let _ = writeln!(
            out,
            "- {} ({}): {}",
            s.name,
            s.id,
            format_percent(s.attendance_percentage())
        );
    }
    out
}

pub fn overall_report(roster: &Roster) -> String {
    overall_report_on(roster, &dates::today())
}

pub fn overall_report_on(roster: &Roster, today: &str) -> String {
    let mut out = String::new();
    out.push_str("=== Overall Statistics ===\n");
    let _ = writeln!(out, "Total Students: {}", roster.len());
    let _ = writeln!(out, "Total Classes: {}", roster.total_classes());
    let _ = writeln!(
        out,
        "Overall Average Attendance: {}",
        format_percent(roster.overall_percentage())
    );
    let _ = writeln!(
        out,
        "Today's Attendance: {}\n",
        format_percent(roster.percentage_on(today))
    );
    out.push_str("Class-wise Statistics:\n");
    for class_name in roster.classes() {
        let _ = writeln!(
            out,
            "- {}: {} students, {} average attendance",
            class_name,
            roster.students_in_class(&class_name).len(),
            format_percent(roster.class_percentage(&class_name))
        );
    }
    out
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per recorded (student, date) in the class. Returns the text and
/// the number of data rows.
pub fn class_attendance_csv(roster: &Roster, class_name: &str) -> (String, usize) {
    let mut out = String::from("student_id,name,date,present\n");
    let mut rows = 0usize;
    for s in roster.students_in_class(class_name) {
        let mut entries: Vec<(&String, &bool)> = s.attendance.iter().collect();
        // Chronological, not lexical: keys are dd-MM-yyyy.
        entries.sort_by_key(|(date, _)| dates::parse_date(date));
        for (date, present) in entries {
            let _ = writeln!(
                out,
                "{},{},{},{}",
                csv_quote(&s.id),
                csv_quote(&s.name),
                csv_quote(date),
                if *present { 1 } else { 0 }
            );
            rows += 1;
        }
    }
    (out, rows)
}

/// Every student with its attendance map, as a pretty-printed JSON array in
/// roster order.
pub fn roster_json(roster: &Roster) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&roster.students())
}
