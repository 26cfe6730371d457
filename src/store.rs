use crate::student::Student;
use anyhow::Context;
use rusqlite::Connection;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceMark {
    pub student_id: String,
    pub date: String,
    pub present: bool,
}

/// Row-level persistence for a roster. Every call is one atomic write.
pub trait RosterStore {
    /// All students in insertion order, attendance included.
    fn load(&self) -> anyhow::Result<Vec<Student>>;
    fn insert_student(&mut self, student: &Student) -> anyhow::Result<()>;
    fn update_student(&mut self, student: &Student) -> anyhow::Result<()>;
    fn delete_student(&mut self, id: &str) -> anyhow::Result<()>;
    fn record_attendance(&mut self, marks: &[AttendanceMark]) -> anyhow::Result<()>;
    fn clear_all(&mut self) -> anyhow::Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl RosterStore for SqliteStore {
    fn load(&self) -> anyhow::Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, email, class_name
                 FROM students
                 ORDER BY sort_order",
            )
            .context("failed to prepare student query")?;
        let mut students = stmt
            .query_map([], |r| {
                Ok(Student::new(
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read students")?;

        let by_id: HashMap<String, usize> = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT student_id, date, present FROM attendance")
            .context("failed to prepare attendance query")?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)? != 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read attendance")?;
        for (student_id, date, present) in rows {
            if let Some(&idx) = by_id.get(&student_id) {
                students[idx].attendance.insert(date, present);
            }
        }

        Ok(students)
    }

    fn insert_student(&mut self, student: &Student) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        let sort_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
            [],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO students(id, name, email, class_name, sort_order, updated_at)
             VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &student.id,
                &student.name,
                &student.email,
                &student.class_name,
                sort_order,
            ),
        )
        .with_context(|| format!("failed to insert student {}", student.id))?;
        for (date, present) in &student.attendance {
            upsert_attendance(&tx, &student.id, date, *present)?;
        }
        tx.commit().context("failed to commit student insert")?;
        Ok(())
    }

    fn update_student(&mut self, student: &Student) -> anyhow::Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE students
                 SET name = ?, email = ?, class_name = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ?",
                (
                    &student.name,
                    &student.email,
                    &student.class_name,
                    &student.id,
                ),
            )
            .with_context(|| format!("failed to update student {}", student.id))?;
        if changed == 0 {
            anyhow::bail!("student {} is not stored", student.id);
        }
        Ok(())
    }

    fn delete_student(&mut self, id: &str) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM attendance WHERE student_id = ?", [id])?;
        tx.execute("DELETE FROM students WHERE id = ?", [id])
            .with_context(|| format!("failed to delete student {}", id))?;
        tx.commit().context("failed to commit student delete")?;
        Ok(())
    }

    fn record_attendance(&mut self, marks: &[AttendanceMark]) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        for m in marks {
            upsert_attendance(&tx, &m.student_id, &m.date, m.present)?;
        }
        tx.commit().context("failed to commit attendance")?;
        Ok(())
    }

    fn clear_all(&mut self) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM attendance", [])?;
        tx.execute("DELETE FROM students", [])
            .context("failed to clear students")?;
        tx.commit().context("failed to commit clear")?;
        Ok(())
    }
}

fn upsert_attendance(
    conn: &Connection,
    student_id: &str,
    date: &str,
    present: bool,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(student_id, date, present)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           present = excluded.present",
        (student_id, date, present as i64),
    )
    .with_context(|| format!("failed to record attendance for {} on {}", student_id, date))?;
    Ok(())
}
