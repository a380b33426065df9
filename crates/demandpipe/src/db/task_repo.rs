//! Task repository: one row per demand file a job processes.

use std::path::Path;

use rusqlite::{params, OptionalExtension, Row};

use super::job_repo;
use super::status::{JobStatus, SummaryStatus, TaskStatus};
use super::{timestamp_now, Database, DatabaseError};

/// A raw task row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub job_id: String,
    pub demand_file_id: Option<String>,
    pub file_name: String,
    pub file_path: Option<String>,
    pub output_file_path: Option<String>,
    pub summary_status: SummaryStatus,
    pub status: TaskStatus,
    pub pid: Option<i64>,
    pub page_count: Option<i64>,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    /// A fresh pending task with no demand file attached.
    pub fn new(id: impl Into<String>, job_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: id.into(),
            job_id: job_id.into(),
            demand_file_id: None,
            file_name: file_name.into(),
            file_path: None,
            output_file_path: None,
            summary_status: SummaryStatus::NotSummarized,
            status: TaskStatus::Pending,
            pid: None,
            page_count: None,
            start_ts: None,
            end_ts: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("jobId")?,
            demand_file_id: row.get("demandFileId")?,
            file_name: row.get("fileName")?,
            file_path: row.get("filePath")?,
            output_file_path: row.get("outputFilePath")?,
            summary_status: row.get("summaryStatus")?,
            status: row.get("status")?,
            pid: row.get("pid")?,
            page_count: row.get("pageCount")?,
            start_ts: row.get("startTs")?,
            end_ts: row.get("endTs")?,
            created_at: row.get("createdAt")?,
            updated_at: row.get("updatedAt")?,
        })
    }
}

/// Inserts a task row as-is.
pub fn insert(db: &Database, task: &TaskRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"INSERT INTO "Task" ("id", "jobId", "demandFileId", "fileName", "filePath",
                   "outputFilePath", "summaryStatus", "status", "pid", "pageCount",
                   "startTs", "endTs", "createdAt", "updatedAt")
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                task.id,
                task.job_id,
                task.demand_file_id,
                task.file_name,
                task.file_path,
                task.output_file_path,
                task.summary_status,
                task.status,
                task.pid,
                task.page_count,
                task.start_ts,
                task.end_ts,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Creates a pending task for every demand file of the job's demand note that
/// is not summarized yet and has no task in this job. Returns how many were created.
pub fn create_tasks_for_job(db: &Database, job_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        let demand_files: Vec<(String, String, Option<String>)> = {
            let mut stmt = tx.prepare(
                r#"SELECT df."id", df."fileName", df."filePath"
                   FROM "DemandFile" df
                   JOIN "Job" j ON j."demandNoteId" = df."demandNoteId"
                   WHERE j."id" = ?1
                     AND df."summaryStatus" = ?2
                     AND NOT EXISTS (
                         SELECT 1 FROM "Task" t
                         WHERE t."jobId" = j."id" AND t."demandFileId" = df."id"
                     )
                   ORDER BY df."createdAt" ASC, df.rowid ASC"#,
            )?;
            let rows = stmt
                .query_map(params![job_id, SummaryStatus::NotSummarized], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for (demand_file_id, file_name, file_path) in &demand_files {
            let now = timestamp_now();
            tx.execute(
                r#"INSERT INTO "Task" ("id", "jobId", "demandFileId", "fileName", "filePath",
                       "summaryStatus", "status", "createdAt", "updatedAt")
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)"#,
                params![
                    uuid::Uuid::new_v4().to_string(),
                    job_id,
                    demand_file_id,
                    file_name,
                    file_path,
                    SummaryStatus::NotSummarized,
                    TaskStatus::Pending,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        log::info!("Created {} tasks for job {}", demand_files.len(), job_id);
        Ok(demand_files.len())
    })
}

/// All tasks of a job, in creation order.
pub fn tasks_for_job(db: &Database, job_id: &str) -> Result<Vec<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"SELECT * FROM "Task" WHERE "jobId" = ?1 ORDER BY "createdAt" ASC, rowid ASC"#,
        )?;
        let rows = stmt
            .query_map(params![job_id], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                r#"SELECT * FROM "Task" WHERE "id" = ?1"#,
                params![id],
                TaskRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Puts every task of the job that is not completed back to `pending`,
/// clearing its pid and timestamps. Returns how many rows were reset.
pub fn reset_outstanding(db: &Database, job_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let now = timestamp_now();
        let reset = conn.execute(
            r#"UPDATE "Task"
               SET "status" = ?2, "pid" = NULL, "startTs" = NULL, "endTs" = NULL,
                   "updatedAt" = ?4
               WHERE "jobId" = ?1 AND "status" != ?3"#,
            params![job_id, TaskStatus::Pending, TaskStatus::Completed, now],
        )?;
        if reset > 0 {
            log::debug!("Reset {} outstanding tasks of job {}", reset, job_id);
        }
        Ok(reset)
    })
}

/// Records that `pid` started working on the task.
pub fn mark_in_progress(db: &Database, task_id: &str, pid: u32) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let now = timestamp_now();
        conn.execute(
            r#"UPDATE "Task"
               SET "status" = ?2, "pid" = ?3, "startTs" = ?4, "updatedAt" = ?4
               WHERE "id" = ?1"#,
            params![task_id, TaskStatus::InProgress, pid, now],
        )?;
        Ok(())
    })
}

/// Marks the task completed with its output directory and page count, marks
/// its demand file summarized, and reconciles the job status.
///
/// Returns the job status written by the reconciliation, if it changed.
pub fn mark_completed(
    db: &Database,
    task_id: &str,
    job_id: &str,
    output_directory: &Path,
    page_count: usize,
) -> Result<Option<JobStatus>, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let now = timestamp_now();

        tx.execute(
            r#"UPDATE "Task"
               SET "status" = ?2, "outputFilePath" = ?3, "pageCount" = ?4,
                   "summaryStatus" = ?5, "endTs" = ?6, "updatedAt" = ?6
               WHERE "id" = ?1"#,
            params![
                task_id,
                TaskStatus::Completed,
                output_directory.to_string_lossy().into_owned(),
                page_count as i64,
                SummaryStatus::Summarized,
                now,
            ],
        )?;

        tx.execute(
            r#"UPDATE "DemandFile" SET "summaryStatus" = ?2
               WHERE "id" = (SELECT "demandFileId" FROM "Task" WHERE "id" = ?1)"#,
            params![task_id, SummaryStatus::Summarized],
        )?;

        let job_status = job_repo::reconcile_with(&tx, job_id)?;
        tx.commit()?;
        Ok(job_status)
    })
}

/// Marks the task failed and reconciles the job status.
pub fn mark_failed(
    db: &Database,
    task_id: &str,
    job_id: &str,
    reason: &str,
) -> Result<Option<JobStatus>, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let now = timestamp_now();

        tx.execute(
            r#"UPDATE "Task" SET "status" = ?2, "endTs" = ?3, "updatedAt" = ?3 WHERE "id" = ?1"#,
            params![task_id, TaskStatus::Failed, now],
        )?;
        log::warn!("Task {} failed: {}", task_id, reason);

        let job_status = job_repo::reconcile_with(&tx, job_id)?;
        tx.commit()?;
        Ok(job_status)
    })
}

pub fn job_id_for_task(db: &Database, task_id: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let job_id = conn
            .query_row(
                r#"SELECT "jobId" FROM "Task" WHERE "id" = ?1"#,
                params![task_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(job_id)
    })
}

/// The most recent task for a demand file.
pub fn find_by_demand_file_id(
    db: &Database,
    demand_file_id: &str,
) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                r#"SELECT * FROM "Task" WHERE "demandFileId" = ?1
                   ORDER BY "createdAt" DESC, rowid DESC LIMIT 1"#,
                params![demand_file_id],
                TaskRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
