use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LetterError {
    #[error("Metadata JSON not found: {0}")]
    MetadataNotFound(PathBuf),

    #[error("Failed to read metadata '{path}': {source}")]
    ReadMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON: {0}")]
    ParseMetadata(#[from] serde_json::Error),

    #[error("Metadata is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid date in '{field}': {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Failed to build DOCX: {0}")]
    Docx(String),

    #[error("Failed to write document '{path}': {source}")]
    WriteDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
