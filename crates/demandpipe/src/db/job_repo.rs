//! Job repository: reads and status transitions for the `Job` table.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::status::{JobStatus, TaskStatus};
use super::{timestamp_now, Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub demand_note_id: Option<String>,
    pub status: JobStatus,
    pub create_ts: String,
    pub update_ts: String,
}

impl JobRow {
    /// A fresh pending job for the given demand note.
    pub fn new(id: impl Into<String>, demand_note_id: Option<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: id.into(),
            demand_note_id,
            status: JobStatus::Pending,
            create_ts: now.clone(),
            update_ts: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            demand_note_id: row.get("demandNoteId")?,
            status: row.get("status")?,
            create_ts: row.get("createTs")?,
            update_ts: row.get("updateTs")?,
        })
    }
}

/// Per-status task tally for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_progress: u64,
    pub pending: u64,
}

impl TaskCounts {
    /// True once every task is completed or failed. False when there are no tasks.
    pub fn all_terminal(&self) -> bool {
        self.total > 0 && self.completed + self.failed == self.total
    }

    pub fn all_completed(&self) -> bool {
        self.completed == self.total
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"INSERT INTO "Job" ("id", "demandNoteId", "status", "createTs", "updateTs")
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                job.id,
                job.demand_note_id,
                job.status,
                job.create_ts,
                job.update_ts,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                r#"SELECT * FROM "Job" WHERE "id" = ?1"#,
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn mark_in_progress(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| set_status(conn, id, JobStatus::InProgress))
}

/// Marks the job completed, but only when every one of its tasks is completed.
///
/// Returns `false` (and leaves the row untouched) otherwise. A job without
/// tasks has nothing outstanding and is completed.
pub fn mark_completed(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let counts = counts_with(conn, id)?;
        if !counts.all_completed() {
            log::debug!(
                "Job {} not completed: {}/{} tasks done",
                id,
                counts.completed,
                counts.total
            );
            return Ok(false);
        }
        set_status(conn, id, JobStatus::Completed)?;
        Ok(true)
    })
}

pub fn mark_failed(db: &Database, id: &str, reason: Option<&str>) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        set_status(conn, id, JobStatus::Failed)?;
        log::warn!("Job {} failed: {}", id, reason.unwrap_or("no reason given"));
        Ok(())
    })
}

pub fn task_counts(db: &Database, id: &str) -> Result<TaskCounts, DatabaseError> {
    db.with_conn(|conn| counts_with(conn, id))
}

/// True when every task of the job is completed or failed.
pub fn all_tasks_terminal(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    Ok(task_counts(db, id)?.all_terminal())
}

/// Recomputes the job status from its tasks.
///
/// - all tasks completed: job completed
/// - all tasks terminal with at least one failure: job failed
/// - otherwise (or no tasks): unchanged
///
/// Returns the status written, if any.
pub fn reconcile_status(db: &Database, id: &str) -> Result<Option<JobStatus>, DatabaseError> {
    db.with_conn(|conn| reconcile_with(conn, id))
}

/// [`reconcile_status`] on an already-locked connection, for callers that
/// update a task and the job in one critical section.
pub(crate) fn reconcile_with(
    conn: &Connection,
    id: &str,
) -> Result<Option<JobStatus>, DatabaseError> {
    let counts = counts_with(conn, id)?;

    if counts.total == 0 {
        return Ok(None);
    }

    if counts.all_completed() {
        set_status(conn, id, JobStatus::Completed)?;
        return Ok(Some(JobStatus::Completed));
    }

    if counts.all_terminal() && counts.failed > 0 {
        set_status(conn, id, JobStatus::Failed)?;
        log::warn!(
            "Job {} failed: {} out of {} tasks failed.",
            id,
            counts.failed,
            counts.total
        );
        return Ok(Some(JobStatus::Failed));
    }

    Ok(None)
}

fn counts_with(conn: &Connection, id: &str) -> Result<TaskCounts, DatabaseError> {
    let counts = conn.query_row(
        r#"SELECT
               COUNT(*),
               COUNT(CASE WHEN "status" = ?2 THEN 1 END),
               COUNT(CASE WHEN "status" = ?3 THEN 1 END),
               COUNT(CASE WHEN "status" = ?4 THEN 1 END),
               COUNT(CASE WHEN "status" = ?5 THEN 1 END)
           FROM "Task"
           WHERE "jobId" = ?1"#,
        params![
            id,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::InProgress,
            TaskStatus::Pending,
        ],
        |r| {
            Ok(TaskCounts {
                total: r.get(0)?,
                completed: r.get(1)?,
                failed: r.get(2)?,
                in_progress: r.get(3)?,
                pending: r.get(4)?,
            })
        },
    )?;
    Ok(counts)
}

fn set_status(conn: &Connection, id: &str, status: JobStatus) -> Result<(), DatabaseError> {
    conn.execute(
        r#"UPDATE "Job" SET "status" = ?2, "updateTs" = ?3 WHERE "id" = ?1"#,
        params![id, status, timestamp_now()],
    )?;
    Ok(())
}
