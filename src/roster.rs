use crate::dates;
use crate::student::{AttendanceSummary, Student};
use crate::store::{AttendanceMark, RosterStore};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub class_name: Option<String>,
}

/// Owns every student record. Mutations update memory first, then the
/// store; a store failure is logged and the in-memory change is kept.
pub struct Roster {
    students: HashMap<String, Student>,
    order: Vec<String>,
    store: Box<dyn RosterStore>,
}

impl Roster {
    pub fn open(store: Box<dyn RosterStore>) -> Self {
        let loaded = match store.load() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("failed to load roster, starting empty: {e:#}");
                Vec::new()
            }
        };
        let mut roster = Self {
            students: HashMap::new(),
            order: Vec::new(),
            store,
        };
        for s in loaded {
            if roster.students.contains_key(&s.id) {
                tracing::warn!(student_id = %s.id, "duplicate student in store, skipping");
                continue;
            }
            roster.order.push(s.id.clone());
            roster.students.insert(s.id.clone(), s);
        }
        tracing::info!(students = roster.order.len(), "roster loaded");
        roster
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn add_student(&mut self, student: Student) -> bool {
        if student.id.trim().is_empty() || self.students.contains_key(&student.id) {
            return false;
        }
        if let Err(e) = self.store.insert_student(&student) {
            tracing::warn!(student_id = %student.id, "failed to persist new student: {e:#}");
        }
        self.order.push(student.id.clone());
        self.students.insert(student.id.clone(), student);
        true
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    /// All students in insertion order.
    pub fn students(&self) -> Vec<&Student> {
        self.order
            .iter()
            .filter_map(|id| self.students.get(id))
            .collect()
    }

    pub fn students_in_class(&self, class_name: &str) -> Vec<&Student> {
        self.students()
            .into_iter()
            .filter(|s| s.class_name == class_name)
            .collect()
    }

    pub fn classes(&self) -> BTreeSet<String> {
        self.students
            .values()
            .map(|s| s.class_name.clone())
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Student> {
        let q = query.to_lowercase();
        self.students()
            .into_iter()
            .filter(|s| s.matches(&q))
            .collect()
    }

    pub fn update_student(&mut self, id: &str, patch: StudentPatch) -> bool {
        let Some(student) = self.students.get_mut(id) else {
            return false;
        };
        if let Some(v) = patch.name {
            student.name = v;
        }
        if let Some(v) = patch.email {
            student.email = v;
        }
        if let Some(v) = patch.class_name {
            student.class_name = v;
        }
        if let Err(e) = self.store.update_student(student) {
            tracing::warn!(student_id = %id, "failed to persist student update: {e:#}");
        }
        true
    }

    pub fn remove_student(&mut self, id: &str) -> bool {
        if self.students.remove(id).is_none() {
            return false;
        }
        self.order.retain(|v| v != id);
        if let Err(e) = self.store.delete_student(id) {
            tracing::warn!(student_id = %id, "failed to persist student removal: {e:#}");
        }
        true
    }

    /// Removes every student and all attendance. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.order.len();
        self.students.clear();
        self.order.clear();
        if let Err(e) = self.store.clear_all() {
            tracing::warn!("failed to persist roster clear: {e:#}");
        }
        tracing::info!(removed, "roster cleared");
        removed
    }

    /// Returns false, and records nothing, for an unknown id.
    pub fn mark_attendance(&mut self, id: &str, date: &str, present: bool) -> bool {
        let Some(student) = self.students.get_mut(id) else {
            return false;
        };
        student.set_attendance(date, present);
        let mark = AttendanceMark {
            student_id: id.to_string(),
            date: date.to_string(),
            present,
        };
        if let Err(e) = self.store.record_attendance(&[mark]) {
            tracing::warn!(student_id = %id, date, "failed to persist attendance: {e:#}");
        }
        true
    }

    /// Marks every student of `class_name` that has an entry in `entries`.
    /// Returns how many students were marked.
    pub fn mark_attendance_for_class(
        &mut self,
        class_name: &str,
        date: &str,
        entries: &HashMap<String, bool>,
    ) -> usize {
        let mut marks: Vec<AttendanceMark> = Vec::new();
        for id in &self.order {
            let Some(student) = self.students.get_mut(id) else {
                continue;
            };
            if student.class_name != class_name {
                continue;
            }
            let Some(&present) = entries.get(id) else {
                continue;
            };
            student.set_attendance(date, present);
            marks.push(AttendanceMark {
                student_id: id.clone(),
                date: date.to_string(),
                present,
            });
        }
        if marks.is_empty() {
            return 0;
        }
        if let Err(e) = self.store.record_attendance(&marks) {
            tracing::warn!(class_name, date, "failed to persist class attendance: {e:#}");
        }
        marks.len()
    }

    pub fn attendance(&self, id: &str, date: &str) -> bool {
        self.student(id).map(|s| s.is_present(date)).unwrap_or(false)
    }

    pub fn attendance_for_date(&self, date: &str) -> BTreeMap<String, bool> {
        self.students
            .values()
            .map(|s| (s.id.clone(), s.is_present(date)))
            .collect()
    }

    pub fn class_attendance_for_date(
        &self,
        class_name: &str,
        date: &str,
    ) -> BTreeMap<String, bool> {
        self.students
            .values()
            .filter(|s| s.class_name == class_name)
            .map(|s| (s.id.clone(), s.is_present(date)))
            .collect()
    }

    pub fn attendance_summary(&self, id: &str) -> Option<AttendanceSummary> {
        self.student(id).map(Student::summary)
    }

    /// Unweighted mean of per-student percentages.
    pub fn overall_percentage(&self) -> f64 {
        mean(self.students.values().map(Student::attendance_percentage))
    }

    /// Unweighted mean of per-student percentages within the class.
    pub fn class_percentage(&self, class_name: &str) -> f64 {
        mean(
            self.students
                .values()
                .filter(|s| s.class_name == class_name)
                .map(Student::attendance_percentage),
        )
    }

    /// Share of students present on `date`; unrecorded counts as absent.
    pub fn percentage_on(&self, date: &str) -> f64 {
        mean(
            self.students
                .values()
                .map(|s| if s.is_present(date) { 100.0 } else { 0.0 }),
        )
    }

    pub fn today_percentage(&self) -> f64 {
        self.percentage_on(&dates::today())
    }

    /// Largest per-student count of recorded dates.
    pub fn total_classes(&self) -> usize {
        self.students
            .values()
            .map(Student::total_classes)
            .max()
            .unwrap_or(0)
    }

    pub fn current_date(&self) -> String {
        dates::today()
    }
}

fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut n: usize = 0;
    let mut sum = 0.0;
    for v in values {
        n += 1;
        sum += v;
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
