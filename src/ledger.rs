//! Students, activities and the append-only point ledger.
//!
//! Every write runs inside a single `BEGIN IMMEDIATE` transaction: either all
//! statements of an operation commit, or none do. Reads never cache.

use crate::level::Level;
use rusqlite::{ffi, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Internal(#[from] rusqlite::Error),
}

impl LedgerError {
    /// IPC error code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "bad_params",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Internal(_) => "db_query_failed",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub level: Level,
    pub points: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub description: String,
    pub point_value: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A ledger row as seen from the student's history page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEntry {
    pub id: i64,
    pub points_awarded: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub activity_id: i64,
    pub activity_description: String,
    pub activity_point_value: i64,
}

/// A ledger row joined with both of its references.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub id: i64,
    pub points_awarded: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub student_id: i64,
    pub student_name: String,
    pub activity_id: i64,
    pub activity_description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub points: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub student_id: i64,
    pub name: String,
    pub level: Level,
    pub points: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub description: String,
    pub point_value: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub activity_id: i64,
    pub description: String,
    pub point_value: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointAward {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub activity_id: Option<i64>,
    /// Falls back to the activity's `point_value` when absent.
    #[serde(default)]
    pub points_awarded: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardReceipt {
    pub entry_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub activity_id: i64,
    pub activity_description: String,
    pub points_awarded: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Row kept with `is_active = 0` because ledger entries reference it.
    Soft,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOutcome {
    pub skipped: bool,
    pub inserted_activities: usize,
    pub inserted_students: usize,
}

pub const DEFAULT_ACTIVITIES: &[(&str, i64)] = &[
    ("Web Lesson: On Time!", 15),
    ("Web Lesson: Early Bird!", 20),
    ("Web Lesson: Late Submission", 5),
    ("Book Homework: On Time!", 15),
    ("Book Homework: Early Bird!", 20),
    ("Book Homework: Late Submission", 5),
    ("Checking Out", 20),
    ("Project Zone", 20),
    ("Week Bonus", 40),
    ("Web Lesson: High Score Bonus!", 30),
];

pub const DEFAULT_STUDENTS: &[(&str, i64)] = &[
    ("Ana Clara", 35),
    ("Emanuel", 70),
    ("Enzo", 35),
    ("Henzo", 15),
    ("Louise", 35),
    ("Manuela Marques", 15),
    ("Manuella Madoglio", 35),
];

/// Ceiling on a student's running total. Keeps every score sum, including
/// `points + Σ entries`, far from `i64` overflow.
pub const MAX_STUDENT_POINTS: i64 = 1_000_000_000;

pub(crate) const STUDENT_COLUMNS: &str =
    "s.id, s.name, s.level, s.points, s.is_active, s.created_at, s.updated_at";

pub(crate) fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        points: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        description: row.get(1)?,
        point_value: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn required_text(value: &str, field: &str) -> LedgerResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(LedgerError::Validation(format!("{field} must not be empty")));
    }
    Ok(t.to_string())
}

fn points_in_range(points: i64) -> LedgerResult<i64> {
    if points < 0 {
        return Err(LedgerError::Validation("points must be >= 0".into()));
    }
    if points > MAX_STUDENT_POINTS {
        return Err(LedgerError::Validation(format!(
            "points must be <= {MAX_STUDENT_POINTS}"
        )));
    }
    Ok(points)
}

fn positive_point_value(point_value: i64) -> LedgerResult<i64> {
    if point_value <= 0 {
        return Err(LedgerError::Validation("pointValue must be > 0".into()));
    }
    Ok(point_value)
}

fn is_constraint(e: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(f, _) if f.extended_code == extended_code)
}

fn write_tx(conn: &mut Connection) -> LedgerResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn duplicate_name(name: &str) -> LedgerError {
    LedgerError::Conflict(format!("a student named {name:?} already exists"))
}

// ===== students =====

pub fn create_student(conn: &mut Connection, input: &NewStudent) -> LedgerResult<i64> {
    let name = required_text(&input.name, "name")?;
    let level = input.level.unwrap_or_default();
    let points = points_in_range(input.points.unwrap_or(0))?;

    let tx = write_tx(conn)?;
    match tx.execute(
        "INSERT INTO students(name, level, points, is_active, created_at, updated_at)
         VALUES(?, ?, ?, 1,
                strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&name, level, points),
    ) {
        Ok(_) => {}
        Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            return Err(duplicate_name(&name))
        }
        Err(e) => return Err(e.into()),
    }
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

/// Full replace of the mutable fields. Setting `is_active` back to true is
/// how a soft-deleted student is restored.
pub fn update_student(conn: &mut Connection, input: &StudentUpdate) -> LedgerResult<()> {
    let name = required_text(&input.name, "name")?;
    let points = points_in_range(input.points)?;

    let tx = write_tx(conn)?;
    let changed = match tx.execute(
        "UPDATE students
         SET name = ?, level = ?, points = ?, is_active = ?,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (&name, input.level, points, input.is_active, input.student_id),
    ) {
        Ok(n) => n,
        Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            return Err(duplicate_name(&name))
        }
        Err(e) => return Err(e.into()),
    };
    if changed == 0 {
        return Err(LedgerError::NotFound("student not found".into()));
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_student(conn: &mut Connection, student_id: i64) -> LedgerResult<DeleteMode> {
    let tx = write_tx(conn)?;
    let mode = soft_or_hard_delete(&tx, "students", "student_id", student_id)?
        .ok_or_else(|| LedgerError::NotFound("student not found".into()))?;
    tx.commit()?;
    Ok(mode)
}

pub fn list_active_students(conn: &Connection) -> LedgerResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS}
         FROM students s
         WHERE s.is_active = 1
         ORDER BY s.points DESC, s.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Looks a student up regardless of `is_active`.
pub fn get_student(conn: &Connection, student_id: i64) -> LedgerResult<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE s.id = ?");
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

// ===== activities =====

pub fn create_activity(conn: &mut Connection, input: &NewActivity) -> LedgerResult<i64> {
    let description = required_text(&input.description, "description")?;
    let point_value = positive_point_value(input.point_value)?;

    let tx = write_tx(conn)?;
    tx.execute(
        "INSERT INTO point_activities(description, point_value, is_active, created_at, updated_at)
         VALUES(?, ?, 1,
                strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&description, point_value),
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

pub fn update_activity(conn: &mut Connection, input: &ActivityUpdate) -> LedgerResult<()> {
    let description = required_text(&input.description, "description")?;
    let point_value = positive_point_value(input.point_value)?;

    let tx = write_tx(conn)?;
    let changed = tx.execute(
        "UPDATE point_activities
         SET description = ?, point_value = ?, is_active = ?,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (&description, point_value, input.is_active, input.activity_id),
    )?;
    if changed == 0 {
        return Err(LedgerError::NotFound("activity not found".into()));
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_activity(conn: &mut Connection, activity_id: i64) -> LedgerResult<DeleteMode> {
    let tx = write_tx(conn)?;
    let mode = soft_or_hard_delete(&tx, "point_activities", "activity_id", activity_id)?
        .ok_or_else(|| LedgerError::NotFound("activity not found".into()))?;
    tx.commit()?;
    Ok(mode)
}

pub fn list_active_activities(conn: &Connection) -> LedgerResult<Vec<Activity>> {
    let mut stmt = conn.prepare(
        "SELECT id, description, point_value, is_active, created_at, updated_at
         FROM point_activities
         WHERE is_active = 1
         ORDER BY description, id",
    )?;
    let rows = stmt
        .query_map([], activity_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_activity(conn: &Connection, activity_id: i64) -> LedgerResult<Option<Activity>> {
    Ok(conn
        .query_row(
            "SELECT id, description, point_value, is_active, created_at, updated_at
             FROM point_activities
             WHERE id = ?",
            [activity_id],
            activity_from_row,
        )
        .optional()?)
}

/// Soft delete when any ledger entry references the row, hard delete
/// otherwise. Runs inside the caller's immediate transaction so no entry can
/// slip in between the count and the delete; the hard delete is still
/// FK-guarded and degrades to a soft delete on a constraint violation.
/// Returns `None` when the row does not exist.
fn soft_or_hard_delete(
    tx: &Transaction<'_>,
    table: &'static str,
    entry_column: &'static str,
    id: i64,
) -> LedgerResult<Option<DeleteMode>> {
    let exists: Option<i64> = tx
        .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?"), [id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let entry_count: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM point_entries WHERE {entry_column} = ?"),
        [id],
        |r| r.get(0),
    )?;

    let soft = |tx: &Transaction<'_>| -> LedgerResult<DeleteMode> {
        tx.execute(
            &format!(
                "UPDATE {table}
                 SET is_active = 0, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ?"
            ),
            [id],
        )?;
        Ok(DeleteMode::Soft)
    };

    if entry_count > 0 {
        return soft(tx).map(Some);
    }
    match tx.execute(&format!("DELETE FROM {table} WHERE id = ?"), [id]) {
        Ok(_) => Ok(Some(DeleteMode::Hard)),
        Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => soft(tx).map(Some),
        Err(e) => Err(e.into()),
    }
}

// ===== point entries =====

/// Appends one ledger entry and folds the same amount into the student's
/// running total. Not idempotent: each call is a separate award.
pub fn add_points(
    conn: &mut Connection,
    award: &PointAward,
    max_points: i64,
) -> LedgerResult<AwardReceipt> {
    let (Some(student_id), Some(activity_id)) = (
        award.student_id.filter(|v| *v > 0),
        award.activity_id.filter(|v| *v > 0),
    ) else {
        return Err(LedgerError::Validation(
            "studentId and activityId are required".into(),
        ));
    };
    if let Some(p) = award.points_awarded {
        check_award_range(p, max_points)?;
    }

    let tx = write_tx(conn)?;
    let student: Option<(String, i64)> = tx
        .query_row(
            "SELECT name, points FROM students WHERE id = ? AND is_active = 1",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((student_name, running_total)) = student else {
        return Err(LedgerError::NotFound(
            "student not found or inactive".into(),
        ));
    };

    let activity: Option<(String, i64)> = tx
        .query_row(
            "SELECT description, point_value FROM point_activities WHERE id = ? AND is_active = 1",
            [activity_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((activity_description, point_value)) = activity else {
        return Err(LedgerError::NotFound(
            "activity not found or inactive".into(),
        ));
    };

    let points_awarded = award.points_awarded.unwrap_or(point_value);
    check_award_range(points_awarded, max_points)?;
    let Some(new_total) = running_total
        .checked_add(points_awarded)
        .filter(|t| *t <= MAX_STUDENT_POINTS)
    else {
        return Err(LedgerError::Validation(format!(
            "award would push {student_name}'s total past {MAX_STUDENT_POINTS}"
        )));
    };

    let notes = award
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    tx.execute(
        "INSERT INTO point_entries(student_id, activity_id, points_awarded, notes, created_at)
         VALUES(?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (student_id, activity_id, points_awarded, notes),
    )?;
    let entry_id = tx.last_insert_rowid();

    tx.execute(
        "UPDATE students
         SET points = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (new_total, student_id),
    )?;
    tx.commit()?;

    Ok(AwardReceipt {
        entry_id,
        student_id,
        student_name,
        activity_id,
        activity_description,
        points_awarded,
    })
}

fn check_award_range(points: i64, max_points: i64) -> LedgerResult<()> {
    if points <= 0 {
        return Err(LedgerError::Validation("pointsAwarded must be > 0".into()));
    }
    if points > max_points {
        return Err(LedgerError::Validation(format!(
            "pointsAwarded must be <= {max_points}"
        )));
    }
    Ok(())
}

pub fn entries_for_student(conn: &Connection, student_id: i64) -> LedgerResult<Vec<StudentEntry>> {
    let mut stmt = conn.prepare(
        "SELECT pe.id, pe.points_awarded, pe.notes, pe.created_at,
                pa.id, pa.description, pa.point_value
         FROM point_entries pe
         JOIN point_activities pa ON pa.id = pe.activity_id
         WHERE pe.student_id = ?
         ORDER BY pe.created_at DESC, pe.id DESC",
    )?;
    let rows = stmt
        .query_map([student_id], |row| {
            Ok(StudentEntry {
                id: row.get(0)?,
                points_awarded: row.get(1)?,
                notes: row.get(2)?,
                created_at: row.get(3)?,
                activity_id: row.get(4)?,
                activity_description: row.get(5)?,
                activity_point_value: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn recent_entries(conn: &Connection, limit: usize) -> LedgerResult<Vec<RecentEntry>> {
    let mut stmt = conn.prepare(
        "SELECT pe.id, pe.points_awarded, pe.notes, pe.created_at,
                s.id, s.name, pa.id, pa.description
         FROM point_entries pe
         JOIN students s ON s.id = pe.student_id
         JOIN point_activities pa ON pa.id = pe.activity_id
         ORDER BY pe.created_at DESC, pe.id DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RecentEntry {
                id: row.get(0)?,
                points_awarded: row.get(1)?,
                notes: row.get(2)?,
                created_at: row.get(3)?,
                student_id: row.get(4)?,
                student_name: row.get(5)?,
                activity_id: row.get(6)?,
                activity_description: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ===== seed =====

/// Loads the starter catalogue into an empty workspace. Does nothing if
/// either table already has rows.
pub fn seed_defaults(conn: &mut Connection) -> LedgerResult<SeedOutcome> {
    let tx = write_tx(conn)?;
    let existing: i64 = tx.query_row(
        "SELECT (SELECT COUNT(*) FROM point_activities) + (SELECT COUNT(*) FROM students)",
        [],
        |r| r.get(0),
    )?;
    if existing > 0 {
        return Ok(SeedOutcome {
            skipped: true,
            inserted_activities: 0,
            inserted_students: 0,
        });
    }

    {
        let mut ins = tx.prepare(
            "INSERT INTO point_activities(description, point_value, is_active, created_at, updated_at)
             VALUES(?, ?, 1,
                    strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                    strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        )?;
        for (description, point_value) in DEFAULT_ACTIVITIES {
            ins.execute((description, point_value))?;
        }
        let mut ins = tx.prepare(
            "INSERT INTO students(name, level, points, is_active, created_at, updated_at)
             VALUES(?, ?, ?, 1,
                    strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                    strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        )?;
        for (name, points) in DEFAULT_STUDENTS {
            ins.execute((name, Level::Beginner, points))?;
        }
    }
    tx.commit()?;

    Ok(SeedOutcome {
        skipped: false,
        inserted_activities: DEFAULT_ACTIVITIES.len(),
        inserted_students: DEFAULT_STUDENTS.len(),
    })
}
