use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of attempted paths spelled out in a [`ProcessError::SourceNotFound`] message.
const MAX_LISTED_ATTEMPTS: usize = 10;

#[derive(Error, Debug)]
pub enum DemandpipeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Letter error: {0}")]
    Letter(#[from] crate::letter::LetterError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("{}", source_not_found_message(.original, .attempted, .working_directory))]
    SourceNotFound {
        original: String,
        attempted: Vec<PathBuf>,
        working_directory: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

fn source_not_found_message(
    original: &str,
    attempted: &[PathBuf],
    working_directory: &Path,
) -> String {
    let mut message = format!("PDF file not found. Attempted {} paths:\n", attempted.len());
    for (i, path) in attempted.iter().take(MAX_LISTED_ATTEMPTS).enumerate() {
        message.push_str(&format!("  {}. {}\n", i + 1, path.display()));
    }
    if attempted.len() > MAX_LISTED_ATTEMPTS {
        message.push_str(&format!(
            "  ... and {} more paths\n",
            attempted.len() - MAX_LISTED_ATTEMPTS
        ));
    }
    message.push_str(&format!("\nOriginal path from DB: {}\n", original));
    message.push_str(&format!(
        "Current working directory: {}\n",
        working_directory.display()
    ));
    message.push_str(
        "\nTip: Set UPLOADS_BASE_DIR to the base directory containing the 'uploads' folder.",
    );
    message
}

pub type Result<T> = std::result::Result<T, DemandpipeError>;
