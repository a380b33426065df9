//! Isolated environment for running jobs end to end.
//!
//! Each harness gets its own temp directory holding an `uploads/` tree, an
//! `outputs/` tree and a SQLite file, plus a seeded demand note and job.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use demandpipe::config::Config;
use demandpipe::db::demand_file_repo::{self, DemandFileRow};
use demandpipe::db::job_repo::{self, JobRow};
use demandpipe::db::task_repo::{self, TaskRow};
use demandpipe::db::{note_repo, Database, JobStatus};
use demandpipe::pipeline::PipelineConfig;
use demandpipe::worker::{JobReport, JobRunner};

use super::builders::pdf_with_pages;

pub const NOTE_ID: &str = "note-1";
pub const JOB_ID: &str = "job-1";

pub struct TestHarness {
    temp_dir: TempDir,
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub db_path: PathBuf,
    pub db: Database,
    pub config: Config,
}

impl TestHarness {
    /// Creates a harness with a single worker.
    pub fn new() -> Self {
        Self::with_workers(1)
    }

    pub fn with_workers(worker_count: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let uploads_dir = base.join("uploads");
        let outputs_dir = base.join("data");
        std::fs::create_dir_all(&uploads_dir).expect("Failed to create uploads dir");

        let db_path = base.join("db").join("demandpipe.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        note_repo::insert(&db, NOTE_ID, Some("Doe v. Roe")).expect("Failed to insert note");
        job_repo::insert(&db, &JobRow::new(JOB_ID, Some(NOTE_ID.to_string())))
            .expect("Failed to insert job");

        let config = Config {
            database_path: Some(db_path.to_string_lossy().into_owned()),
            uploads_base_dir: Some(uploads_dir.to_string_lossy().into_owned()),
            outputs_base_dir: Some(outputs_dir.to_string_lossy().into_owned()),
            worker_count,
            ..Default::default()
        };

        Self {
            temp_dir,
            uploads_dir,
            outputs_dir,
            db_path,
            db,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline_config(&self) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig::with_working_directory(
            &self.config,
            self.temp_dir.path().to_path_buf(),
        ))
    }

    /// Writes a PDF under `uploads/` and registers it as a demand file whose
    /// stored path is `/<file_name>`.
    pub fn add_pdf(&self, demand_file_id: &str, file_name: &str, pages: &[&str]) {
        self.write_pdf(file_name, pages);
        self.register_file(demand_file_id, file_name);
    }

    /// Writes (or replaces) the PDF bytes of an already registered file.
    pub fn write_pdf(&self, file_name: &str, pages: &[&str]) {
        std::fs::write(self.uploads_dir.join(file_name), pdf_with_pages(pages))
            .expect("Failed to write PDF");
    }

    /// Registers a demand file without writing anything to disk.
    pub fn register_file(&self, demand_file_id: &str, file_name: &str) {
        let mut file = DemandFileRow::new(demand_file_id, NOTE_ID, file_name);
        file.file_path = Some(format!("/{}", file_name));
        demand_file_repo::insert(&self.db, &file).expect("Failed to insert demand file");
    }

    pub fn create_tasks(&self) -> usize {
        task_repo::create_tasks_for_job(&self.db, JOB_ID).expect("Failed to create tasks")
    }

    pub fn run_job(&self) -> JobReport {
        JobRunner::new(self.db.clone(), self.pipeline_config())
            .run(JOB_ID)
            .expect("Job runner failed")
    }

    pub fn job_status(&self) -> JobStatus {
        job_repo::find_by_id(&self.db, JOB_ID)
            .expect("Failed to query job")
            .expect("Job missing")
            .status
    }

    pub fn tasks(&self) -> Vec<TaskRow> {
        task_repo::tasks_for_job(&self.db, JOB_ID).expect("Failed to query tasks")
    }

    pub fn task_for(&self, demand_file_id: &str) -> TaskRow {
        self.tasks()
            .into_iter()
            .find(|t| t.demand_file_id.as_deref() == Some(demand_file_id))
            .expect("No task for demand file")
    }

    /// Base output directory for a file of the seeded job.
    pub fn output_base(&self, stem: &str) -> PathBuf {
        self.outputs_dir.join("outputs").join(JOB_ID).join(stem)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
