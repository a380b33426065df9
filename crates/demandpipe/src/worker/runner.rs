//! Drives one job from `pending` to `completed` or `failed`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::db::task_repo::TaskRow;
use crate::db::{job_repo, task_repo, Database, DatabaseError, JobStatus, TaskStatus};
use crate::error::WorkerError;
use crate::pipeline::PipelineConfig;
use crate::worker::job::TaskJob;
use crate::worker::pool::WorkerPool;

/// Job failure reason recorded when the run was stopped early.
pub const INTERRUPTED_REASON: &str = "interrupted";

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Job runner panicked: {0}")]
    Panicked(String),
}

/// Summary of a finished job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    pub total_tasks: usize,
    /// Tasks processed in this run.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks already completed by an earlier run.
    pub skipped: usize,
    pub interrupted: bool,
    pub reason: Option<String>,
}

pub struct JobRunner {
    db: Database,
    config: Arc<PipelineConfig>,
    shutdown: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(db: Database, config: Arc<PipelineConfig>) -> Self {
        Self {
            db,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses an externally owned stop flag, e.g. one set from a Ctrl-C handler.
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Processes every outstanding task of `job_id` and writes the final job status.
    ///
    /// Any error or panic after the job was found marks it failed before
    /// being returned.
    pub fn run(&self, job_id: &str) -> Result<JobReport, RunnerError> {
        let _span = tracing::info_span!("job", job_id).entered();

        if job_repo::find_by_id(&self.db, job_id)?.is_none() {
            error!("Job not found: {}", job_id);
            return Err(RunnerError::JobNotFound(job_id.to_string()));
        }

        info!("Starting job {} (pid {})", job_id, std::process::id());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_tasks(job_id)))
            .unwrap_or_else(|payload| Err(RunnerError::Panicked(panic_message(&*payload))));

        if let Err(e) = &outcome {
            error!("Job {} failed: {}", job_id, e);
            let reason = e.to_string();
            if let Err(mark_err) = job_repo::mark_failed(&self.db, job_id, Some(reason.as_str())) {
                error!("Failed to mark job {} failed: {}", job_id, mark_err);
            }
        }

        outcome
    }

    /// Marks the job in progress and puts its unfinished tasks back to
    /// `pending`, so stale `failed` rows cannot settle the job mid-run.
    fn prepare(&self, job_id: &str) -> Result<Vec<TaskRow>, RunnerError> {
        job_repo::mark_in_progress(&self.db, job_id)?;
        task_repo::reset_outstanding(&self.db, job_id)?;
        Ok(task_repo::tasks_for_job(&self.db, job_id)?)
    }

    fn run_tasks(&self, job_id: &str) -> Result<JobReport, RunnerError> {
        let tasks = self.prepare(job_id)?;
        if tasks.is_empty() {
            warn!("No tasks found for job {}", job_id);
            job_repo::mark_completed(&self.db, job_id)?;
            return Ok(JobReport {
                job_id: job_id.to_string(),
                status: JobStatus::Completed,
                total_tasks: 0,
                attempted: 0,
                succeeded: 0,
                failed: 0,
                skipped: 0,
                interrupted: false,
                reason: None,
            });
        }

        let (outstanding, done): (Vec<_>, Vec<_>) = tasks
            .iter()
            .partition(|t| t.status != TaskStatus::Completed);
        if !done.is_empty() {
            info!("Skipping {} tasks completed by an earlier run", done.len());
        }

        let pool = WorkerPool::with_shutdown_flag(
            self.db.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.shutdown),
        )?;

        let mut submitted = 0;
        for task in &outstanding {
            match pool.submit(TaskJob::from(*task)) {
                Ok(()) => submitted += 1,
                Err(WorkerError::ChannelClosed) if pool.is_shutdown() => {
                    warn!(
                        "Shutdown requested, {} tasks not submitted",
                        outstanding.len() - submitted
                    );
                    break;
                }
                Err(e) => {
                    pool.shutdown();
                    pool.wait();
                    return Err(e.into());
                }
            }
        }

        let mut succeeded = 0;
        let mut failed = 0;
        while succeeded + failed < submitted {
            match pool.recv_result() {
                Some(result) if result.success => succeeded += 1,
                Some(result) => {
                    warn!(
                        "Task {} failed: {}",
                        result.task_id,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    failed += 1;
                }
                None => break,
            }
        }
        pool.wait();

        let interrupted = self.shutdown.load(Ordering::Relaxed);
        let (status, reason) = self.finalize(job_id, interrupted)?;

        Ok(JobReport {
            job_id: job_id.to_string(),
            status,
            total_tasks: tasks.len(),
            attempted: succeeded + failed,
            succeeded,
            failed,
            skipped: done.len(),
            interrupted,
            reason,
        })
    }

    /// Writes the job's final status from its task tally.
    ///
    /// A job whose tasks all completed is completed even if a stop was
    /// requested after the last result came in.
    fn finalize(
        &self,
        job_id: &str,
        interrupted: bool,
    ) -> Result<(JobStatus, Option<String>), RunnerError> {
        if job_repo::mark_completed(&self.db, job_id)? {
            info!("Job {} completed successfully", job_id);
            return Ok((JobStatus::Completed, None));
        }

        let counts = job_repo::task_counts(&self.db, job_id)?;

        let reason = if interrupted {
            INTERRUPTED_REASON.to_string()
        } else {
            format!("{} out of {} tasks failed.", counts.failed, counts.total)
        };
        job_repo::mark_failed(&self.db, job_id, Some(reason.as_str()))?;
        Ok((JobStatus::Failed, Some(reason)))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::Pipeline;
    use crate::test_support::{add_demand_file, build_pdf, seeded_db};
    use tempfile::TempDir;

    fn runner_in(db: &Database, dir: &TempDir, worker_count: usize) -> JobRunner {
        let config = Config {
            worker_count,
            ..Default::default()
        };
        let pipeline_config = PipelineConfig::with_working_directory(&config, dir.path().into());
        JobRunner::new(db.clone(), Arc::new(pipeline_config))
    }

    fn job_status(db: &Database) -> JobStatus {
        job_repo::find_by_id(db, "job-1").unwrap().unwrap().status
    }

    fn add_task(db: &Database, task_id: &str, demand_file_id: &str, file_name: &str) {
        let mut task = TaskRow::new(task_id, "job-1", file_name);
        task.demand_file_id = Some(demand_file_id.to_string());
        task_repo::insert(db, &task).unwrap();
    }

    #[test]
    fn test_unknown_job() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        let result = runner_in(&db, &dir, 1).run("missing");
        assert!(matches!(result, Err(RunnerError::JobNotFound(id)) if id == "missing"));
    }

    #[test]
    fn test_job_without_tasks_completes() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();

        let report = runner_in(&db, &dir, 1).run("job-1").unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.total_tasks, 0);
        assert_eq!(job_status(&db), JobStatus::Completed);
    }

    #[test]
    fn test_all_tasks_succeed() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        for i in 0..5 {
            let name = format!("doc{}.pdf", i);
            std::fs::write(dir.path().join(&name), build_pdf(&["page"])).unwrap();
            add_demand_file(&db, &format!("df-{}", i), &name, &name);
        }
        assert_eq!(task_repo::create_tasks_for_job(&db, "job-1").unwrap(), 5);

        let report = runner_in(&db, &dir, 2).run("job-1").unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(job_status(&db), JobStatus::Completed);
        assert!(dir.path().join("outputs/job-1/doc3/raw_extract_by_page/page_001.txt").exists());
    }

    #[test]
    fn test_one_missing_file_fails_job() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        std::fs::write(dir.path().join("ok.pdf"), build_pdf(&["page"])).unwrap();
        add_demand_file(&db, "df-ok", "ok.pdf", "ok.pdf");
        add_demand_file(&db, "df-gone", "gone.pdf", "/uploads/gone.pdf");
        task_repo::create_tasks_for_job(&db, "job-1").unwrap();

        let report = runner_in(&db, &dir, 1).run("job-1").unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.reason.as_deref(), Some("1 out of 2 tasks failed."));
        assert_eq!(job_status(&db), JobStatus::Failed);
    }

    #[test]
    fn test_rerun_skips_completed_tasks() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        std::fs::write(dir.path().join("a.pdf"), build_pdf(&["page"])).unwrap();
        add_demand_file(&db, "df-a", "a.pdf", "a.pdf");
        add_demand_file(&db, "df-b", "b.pdf", "b.pdf");
        task_repo::create_tasks_for_job(&db, "job-1").unwrap();

        let first = runner_in(&db, &dir, 1).run("job-1").unwrap();
        assert_eq!(first.status, JobStatus::Failed);

        std::fs::write(dir.path().join("b.pdf"), build_pdf(&["page"])).unwrap();
        let second = runner_in(&db, &dir, 1).run("job-1").unwrap();

        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.attempted, 1);
    }

    #[test]
    fn test_shutdown_before_start_marks_job_interrupted() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        let mut task = TaskRow::new("t1", "job-1", "a.pdf");
        task.demand_file_id = None;
        task_repo::insert(&db, &task).unwrap();

        let runner = runner_in(&db, &dir, 1);
        runner.shutdown_flag().store(true, Ordering::Relaxed);
        let report = runner.run("job-1").unwrap();

        assert!(report.interrupted);
        assert_eq!(report.attempted, 0);
        assert_eq!(report.reason.as_deref(), Some(INTERRUPTED_REASON));
        assert_eq!(job_status(&db), JobStatus::Failed);
        assert_eq!(
            task_repo::find_by_id(&db, "t1").unwrap().unwrap().status,
            TaskStatus::Pending
        );
    }

    #[test]
    fn test_rerun_keeps_job_in_progress_until_last_task() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        for (task_id, df_id, name) in [("t-a", "df-a", "a.pdf"), ("t-b", "df-b", "b.pdf")] {
            add_demand_file(&db, df_id, name, name);
            add_task(&db, task_id, df_id, name);
            task_repo::mark_failed(&db, task_id, "job-1", "PDF file not found").unwrap();
        }
        assert_eq!(job_status(&db), JobStatus::Failed);
        std::fs::write(dir.path().join("a.pdf"), build_pdf(&["page"])).unwrap();
        std::fs::write(dir.path().join("b.pdf"), build_pdf(&["page"])).unwrap();

        let runner = runner_in(&db, &dir, 1);
        let tasks = runner.prepare("job-1").unwrap();
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));

        let pipeline = Pipeline::new(db.clone(), Arc::clone(&runner.config));
        let first = TaskJob::from(&tasks[0]);
        let result = crate::worker::pool::process_task(&db, &pipeline, &runner.config, &first, 1);

        assert!(result.success, "Task failed: {:?}", result.error);
        assert_eq!(result.job_status, None);
        assert_eq!(job_status(&db), JobStatus::InProgress);

        let report = runner.run("job-1").unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.attempted, 1);
    }

    #[test]
    fn test_stale_in_progress_task_is_processed() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        std::fs::write(dir.path().join("a.pdf"), build_pdf(&["one", "two"])).unwrap();
        add_demand_file(&db, "df-a", "a.pdf", "a.pdf");
        add_task(&db, "t-a", "df-a", "a.pdf");
        task_repo::mark_in_progress(&db, "t-a", 999_999).unwrap();

        let report = runner_in(&db, &dir, 1).run("job-1").unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        let task = task_repo::find_by_id(&db, "t-a").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.page_count, Some(2));
        assert_eq!(task.pid, Some(std::process::id() as i64));
    }

    #[test]
    fn test_shutdown_after_all_tasks_completed_keeps_job_completed() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        add_demand_file(&db, "df-a", "a.pdf", "a.pdf");
        add_task(&db, "t-a", "df-a", "a.pdf");
        task_repo::mark_completed(&db, "t-a", "job-1", std::path::Path::new("/out/a"), 1).unwrap();

        let runner = runner_in(&db, &dir, 1);
        runner.shutdown_flag().store(true, Ordering::Relaxed);
        let report = runner.run("job-1").unwrap();

        assert!(report.interrupted);
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.reason, None);
        assert_eq!(job_status(&db), JobStatus::Completed);
    }

    #[test]
    fn test_database_error_after_start_marks_job_failed() {
        let dir = TempDir::new().unwrap();
        let db = seeded_db();
        db.with_conn(|conn| {
            conn.execute_batch(r#"DROP TABLE "Task""#)?;
            Ok(())
        })
        .unwrap();

        let result = runner_in(&db, &dir, 1).run("job-1");

        assert!(matches!(result, Err(RunnerError::Database(_))));
        assert_eq!(job_status(&db), JobStatus::Failed);
    }
}
