use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database lookup failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Job ID not found for DemandFile {0}")]
    MissingJob(String),

    #[error("File name not found for DemandFile {0}")]
    MissingFileName(String),

    #[error("Task {0} has no demand file")]
    MissingDemandFile(String),
}
