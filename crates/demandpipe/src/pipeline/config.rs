use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::StorageError;
use crate::source::SearchRoots;
use crate::storage::OutputRoots;

pub struct PipelineConfig {
    pub search_roots: SearchRoots,
    pub output_roots: OutputRoots,
    /// Pause after a task is marked in progress, before extraction starts.
    pub stage_delay: Duration,
    pub worker_count: usize,
}

impl PipelineConfig {
    /// Builds the runtime config, anchoring relative paths at the process
    /// working directory.
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        let working_directory = std::env::current_dir().map_err(StorageError::WorkingDirectory)?;
        Ok(Self::with_working_directory(config, working_directory))
    }

    pub fn with_working_directory(config: &Config, working_directory: PathBuf) -> Self {
        let mut search_roots = SearchRoots::new(working_directory.clone());
        if let Some(dir) = &config.uploads_base_dir {
            search_roots = search_roots.with_uploads_base_dir(dir);
        }

        let mut output_roots = OutputRoots::new(working_directory);
        if let Some(dir) = &config.outputs_base_dir {
            output_roots = output_roots.with_outputs_base_dir(dir);
        }

        Self {
            search_roots,
            output_roots,
            stage_delay: Duration::from_millis(config.stage_delay_ms),
            worker_count: config.worker_count.max(1),
        }
    }
}
