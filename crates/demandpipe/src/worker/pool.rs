use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::db::{demand_file_repo, task_repo, Database};
use crate::error::WorkerError;
use crate::pipeline::{NoopProgress, Pipeline, PipelineConfig, PipelineError};
use crate::worker::job::{TaskJob, TaskResult};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub struct WorkerPool {
    job_sender: Sender<TaskJob>,
    result_receiver: Receiver<TaskResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(db: Database, config: Arc<PipelineConfig>) -> Result<Self, WorkerError> {
        Self::with_shutdown_flag(db, config, Arc::new(AtomicBool::new(false)))
    }

    /// Creates a pool whose workers stop taking new tasks once `shutdown` is set.
    ///
    /// The job queue is bounded to twice the worker count. Results are
    /// unbounded so a submitter blocked on a full queue cannot stall workers.
    pub fn with_shutdown_flag(
        db: Database,
        config: Arc<PipelineConfig>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, WorkerError> {
        let worker_count = config.worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<TaskJob>(worker_count * 2);
        let (result_sender, result_receiver) = unbounded::<TaskResult>();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_db = db.clone();
            let worker_config = Arc::clone(&config);

            let handle = thread::Builder::new()
                .name(format!("demandpipe-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        job_rx,
                        result_tx,
                        shutdown_flag,
                        worker_db,
                        worker_config,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, job: TaskJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Blocks for the next result. `None` once every worker has exited.
    pub fn recv_result(&self) -> Option<TaskResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<TaskJob>,
    result_sender: Sender<TaskResult>,
    shutdown: Arc<AtomicBool>,
    db: Database,
    config: Arc<PipelineConfig>,
) {
    debug!("Worker {} started", worker_id);

    let pipeline = Pipeline::new(db.clone(), Arc::clone(&config));
    let pid = std::process::id();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(job) => {
                debug!("Worker {} processing task {}", worker_id, job.task_id);
                let result = process_task(&db, &pipeline, &config, &job, pid);

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one task end to end and records its outcome on the Task row.
pub(crate) fn process_task(
    db: &Database,
    pipeline: &Pipeline,
    config: &PipelineConfig,
    job: &TaskJob,
    pid: u32,
) -> TaskResult {
    let _span = tracing::info_span!("task", task_id = %job.task_id, job_id = %job.job_id).entered();
    info!("Processing task {} ({})", job.task_id, job.file_name);

    if let Err(e) = task_repo::mark_in_progress(db, &job.task_id, pid) {
        return record_failure(db, job, format!("Failed to mark task in progress: {}", e));
    }

    if !config.stage_delay.is_zero() {
        thread::sleep(config.stage_delay);
    }

    let extraction = panic::catch_unwind(AssertUnwindSafe(|| extract(db, pipeline, job)));

    match extraction {
        Ok(Ok(outcome)) => {
            match task_repo::mark_completed(
                db,
                &job.task_id,
                &job.job_id,
                &outcome.base_path,
                outcome.pages_extracted,
            ) {
                Ok(job_status) => {
                    info!(
                        "Completed task {} ({} pages)",
                        job.task_id, outcome.pages_extracted
                    );
                    TaskResult::success(job, &outcome, job_status)
                }
                Err(e) => record_failure(db, job, format!("Failed to record completion: {}", e)),
            }
        }
        Ok(Err(e)) => record_failure(db, job, e.to_string()),
        Err(_) => record_failure(db, job, "Worker panicked while extracting".to_string()),
    }
}

fn extract(
    db: &Database,
    pipeline: &Pipeline,
    job: &TaskJob,
) -> Result<crate::pipeline::ExtractionOutcome, PipelineError> {
    let demand_file_id = job
        .demand_file_id
        .as_deref()
        .ok_or_else(|| PipelineError::MissingDemandFile(job.task_id.clone()))?;

    let mut record = demand_file_repo::source_record(db, demand_file_id)?;
    record.job_id = Some(job.job_id.clone());
    if !job.file_name.is_empty() {
        record.file_name = Some(job.file_name.clone());
    }
    if job.output_file_path.is_some() {
        record.output_file_path = job.output_file_path.clone();
    }

    pipeline.run_record(record, &NoopProgress)
}

fn record_failure(db: &Database, job: &TaskJob, reason: String) -> TaskResult {
    warn!("Task {} failed: {}", job.task_id, reason);
    let job_status = match task_repo::mark_failed(db, &job.task_id, &job.job_id, &reason) {
        Ok(status) => status,
        Err(e) => {
            error!("Failed to mark task {} failed: {}", job.task_id, e);
            None
        }
    };
    TaskResult::failure(job, reason, job_status)
}
