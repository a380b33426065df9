use std::path::PathBuf;

use crate::db::demand_file_repo::SourceRecord;
use crate::storage::ExtractDirs;

/// State threaded through the extraction steps of one demand file.
pub struct PipelineContext {
    pub record: SourceRecord,

    // Set by the resolve step
    pub source_path: Option<PathBuf>,

    pub page_texts: Vec<String>,

    // Set by the output step
    pub dirs: Option<ExtractDirs>,

    pub files_created: Vec<String>,
}

impl PipelineContext {
    pub fn new(record: SourceRecord) -> Self {
        Self {
            record,
            source_path: None,
            page_texts: Vec::new(),
            dirs: None,
            files_created: Vec::new(),
        }
    }
}
