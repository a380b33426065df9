use std::fmt;

/// Steps of a single extraction run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    FetchingSource,
    ExtractingPages,
    PreparingOutput,
    WritingPages,
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionPhase::FetchingSource => "fetching_source",
            ExtractionPhase::ExtractingPages => "extracting_pages",
            ExtractionPhase::PreparingOutput => "preparing_output",
            ExtractionPhase::WritingPages => "writing_pages",
        };
        f.write_str(name)
    }
}

/// Events emitted by the pipeline during extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: ExtractionPhase,
        message: String,
    },
    Completed {
        base_path: String,
        pages_extracted: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and batch runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Reports every event as a log line tagged with the demand file.
pub struct LogProgress {
    demand_file_id: String,
}

impl LogProgress {
    pub fn new(demand_file_id: impl Into<String>) -> Self {
        Self {
            demand_file_id: demand_file_id.into(),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                tracing::info!(demand_file_id = %self.demand_file_id, %phase, "{}", message);
            }
            ProgressEvent::Completed {
                base_path,
                pages_extracted,
            } => {
                tracing::info!(
                    demand_file_id = %self.demand_file_id,
                    pages = pages_extracted,
                    "Extraction finished in {}",
                    base_path
                );
            }
            ProgressEvent::Failed { error } => {
                tracing::error!(demand_file_id = %self.demand_file_id, "Extraction failed: {}", error);
            }
        }
    }
}
