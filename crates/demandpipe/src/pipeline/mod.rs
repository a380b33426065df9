pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use progress::{ExtractionPhase, LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{ExtractionOutcome, Pipeline};
