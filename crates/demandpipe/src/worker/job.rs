use std::path::PathBuf;

use crate::db::task_repo::TaskRow;
use crate::db::JobStatus;
use crate::pipeline::ExtractionOutcome;

/// A task handed to a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskJob {
    pub task_id: String,
    pub job_id: String,
    pub demand_file_id: Option<String>,
    pub file_name: String,
    pub output_file_path: Option<String>,
}

impl From<&TaskRow> for TaskJob {
    fn from(task: &TaskRow) -> Self {
        Self {
            task_id: task.id.clone(),
            job_id: task.job_id.clone(),
            demand_file_id: task.demand_file_id.clone(),
            file_name: task.file_name.clone(),
            output_file_path: task.output_file_path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub job_id: String,
    pub success: bool,
    pub output_directory: Option<PathBuf>,
    pub page_count: usize,
    pub error: Option<String>,
    /// Job status written while recording this result, if it changed.
    pub job_status: Option<JobStatus>,
}

impl TaskResult {
    pub fn success(
        job: &TaskJob,
        outcome: &ExtractionOutcome,
        job_status: Option<JobStatus>,
    ) -> Self {
        Self {
            task_id: job.task_id.clone(),
            job_id: job.job_id.clone(),
            success: true,
            output_directory: Some(outcome.base_path.clone()),
            page_count: outcome.pages_extracted,
            error: None,
            job_status,
        }
    }

    pub fn failure(job: &TaskJob, error: String, job_status: Option<JobStatus>) -> Self {
        Self {
            task_id: job.task_id.clone(),
            job_id: job.job_id.clone(),
            success: false,
            output_directory: None,
            page_count: 0,
            error: Some(error),
            job_status,
        }
    }
}
