use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub class_name: String,
    /// Date (`dd-MM-yyyy`) -> present.
    #[serde(default)]
    pub attendance: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_classes: usize,
    pub present_classes: usize,
    pub absent_classes: usize,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            class_name: class_name.into(),
            attendance: BTreeMap::new(),
        }
    }

    pub fn mark_present(&mut self, date: &str) {
        self.attendance.insert(date.to_string(), true);
    }

    pub fn mark_absent(&mut self, date: &str) {
        self.attendance.insert(date.to_string(), false);
    }

    pub fn set_attendance(&mut self, date: &str, present: bool) {
        if present {
            self.mark_present(date);
        } else {
            self.mark_absent(date);
        }
    }

    /// Unknown dates read as absent.
    pub fn is_present(&self, date: &str) -> bool {
        self.attendance.get(date).copied().unwrap_or(false)
    }

    pub fn total_classes(&self) -> usize {
        self.attendance.len()
    }

    pub fn present_classes(&self) -> usize {
        self.attendance.values().filter(|p| **p).count()
    }

    pub fn absent_classes(&self) -> usize {
        self.total_classes() - self.present_classes()
    }

    pub fn attendance_percentage(&self) -> f64 {
        if self.attendance.is_empty() {
            return 0.0;
        }
        self.present_classes() as f64 / self.total_classes() as f64 * 100.0
    }

    pub fn summary(&self) -> AttendanceSummary {
        AttendanceSummary {
            total_classes: self.total_classes(),
            present_classes: self.present_classes(),
            absent_classes: self.absent_classes(),
        }
    }

    pub fn matches(&self, lower_query: &str) -> bool {
        [&self.id, &self.name, &self.email, &self.class_name]
            .iter()
            .any(|field| field.to_lowercase().contains(lower_query))
    }
}

/// One decimal place and a `%` sign, ties rounded half up (`6.25` -> `6.3%`).
/// `{:.1}` alone rounds ties to even.
pub fn format_percent(pct: f64) -> String {
    format!("{:.1}%", (pct * 10.0).round() / 10.0)
}

impl PartialEq for Student {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Student {}

impl Hash for Student {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Student{{ID='{}', Name='{}', Email='{}', Class='{}', Attendance={}}}",
            self.id,
            self.name,
            self.email,
            self.class_name,
            format_percent(self.attendance_percentage())
        )
    }
}
