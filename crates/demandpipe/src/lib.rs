pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod letter;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod source;
pub mod storage;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::{apply_env_overrides, load_config, Config};
pub use db::{Database, DatabaseError, JobStatus, TaskStatus};
pub use error::{ConfigError, DemandpipeError, ProcessError, Result, StorageError, WorkerError};
pub use letter::{generate_letter, LetterError};
pub use pipeline::{ExtractionOutcome, Pipeline, PipelineConfig, PipelineContext, PipelineError};
pub use worker::{JobReport, JobRunner, RunnerError};
