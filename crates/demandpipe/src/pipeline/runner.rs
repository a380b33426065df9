use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info_span};

use crate::db::demand_file_repo::{self, SourceRecord};
use crate::db::Database;
use crate::extraction;
use crate::sanitize;
use crate::source;
use crate::storage::{FileStorage, OutputLayout};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ExtractionPhase, ProgressEvent, ProgressReporter};

/// What one extraction run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub base_path: PathBuf,
    pub pages_extracted: usize,
    /// Page file names, in page order.
    pub files_created: Vec<String>,
}

pub struct Pipeline {
    db: Database,
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(db: Database, config: Arc<PipelineConfig>) -> Self {
        Self { db, config }
    }

    /// Runs extraction for a demand file, using its most recent task for
    /// the job and output bookkeeping.
    pub fn run(
        &self,
        demand_file_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionOutcome, PipelineError> {
        progress.report(ProgressEvent::Phase {
            phase: ExtractionPhase::FetchingSource,
            message: format!("Fetching PDF for demand file {}", demand_file_id),
        });

        let record = {
            let _step = info_span!("fetch_record", demand_file_id).entered();
            match demand_file_repo::source_record(&self.db, demand_file_id) {
                Ok(record) => record,
                Err(e) => return Err(fail(progress, e.into())),
            }
        };

        self.run_record(record, progress)
    }

    /// Runs extraction for an already fetched source record.
    pub fn run_record(
        &self,
        record: SourceRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let _pipeline_span = info_span!("pipeline",
            demand_file_id = %record.demand_file_id,
            job_id = record.job_id.as_deref().unwrap_or("unknown"),
        )
        .entered();

        let mut ctx = PipelineContext::new(record);

        // Step 1: Locate and read the PDF
        let pdf_bytes = {
            let _step = info_span!("resolve_source").entered();
            match self.step_read_source(&mut ctx) {
                Ok(bytes) => bytes,
                Err(e) => return Err(fail(progress, e)),
            }
        };

        // Step 2: Extract text by page
        {
            let _step = info_span!("extract_pages").entered();
            progress.report(ProgressEvent::Phase {
                phase: ExtractionPhase::ExtractingPages,
                message: "Extracting text from PDF pages...".to_string(),
            });
            match extraction::extract_pages(&pdf_bytes) {
                Ok(pages) => ctx.page_texts = pages,
                Err(e) => return Err(fail(progress, e.into())),
            }
            debug!("Extracted {} pages", ctx.page_texts.len());
        }

        // Step 3: Resolve the output base and create its subdirectories
        let storage = {
            let _step = info_span!("prepare_output").entered();
            progress.report(ProgressEvent::Phase {
                phase: ExtractionPhase::PreparingOutput,
                message: "Creating output directories...".to_string(),
            });
            match self.step_prepare_output(&mut ctx) {
                Ok(storage) => storage,
                Err(e) => return Err(fail(progress, e)),
            }
        };

        // Step 4: Write one framed file per page
        {
            let _step = info_span!("write_pages", pages = ctx.page_texts.len()).entered();
            progress.report(ProgressEvent::Phase {
                phase: ExtractionPhase::WritingPages,
                message: format!("Saving {} page files...", ctx.page_texts.len()),
            });
            if let Err(e) = self.step_write_pages(&mut ctx, &storage) {
                return Err(fail(progress, e));
            }
        }

        let base_path = storage.base_directory().to_path_buf();
        progress.report(ProgressEvent::Completed {
            base_path: base_path.display().to_string(),
            pages_extracted: ctx.page_texts.len(),
        });

        Ok(ExtractionOutcome {
            base_path,
            pages_extracted: ctx.page_texts.len(),
            files_created: ctx.files_created,
        })
    }

    fn step_read_source(&self, ctx: &mut PipelineContext) -> Result<Vec<u8>, PipelineError> {
        let path = source::resolve_source_path(&ctx.record.file_path, &self.config.search_roots)?;
        debug!(
            file = %sanitize::redact_path(&path),
            path_hash = %sanitize::hash_path(&path),
            "Reading source PDF"
        );
        let bytes = source::read_source(&path)?;
        ctx.source_path = Some(path);
        Ok(bytes)
    }

    fn step_prepare_output(&self, ctx: &mut PipelineContext) -> Result<FileStorage, PipelineError> {
        let record = &ctx.record;
        let job_id = record
            .job_id
            .as_deref()
            .ok_or_else(|| PipelineError::MissingJob(record.demand_file_id.clone()))?;
        let file_name = record
            .file_name
            .as_deref()
            .ok_or_else(|| PipelineError::MissingFileName(record.demand_file_id.clone()))?;

        let layout = OutputLayout {
            job_id,
            file_name,
            output_file_path: record.output_file_path.as_deref(),
        };
        let storage = FileStorage::new(layout.resolve(&self.config.output_roots));
        ctx.dirs = Some(storage.create_subdirectories()?);
        Ok(storage)
    }

    fn step_write_pages(
        &self,
        ctx: &mut PipelineContext,
        storage: &FileStorage,
    ) -> Result<(), PipelineError> {
        let raw_dir = match &ctx.dirs {
            Some(dirs) => dirs.raw_extract_by_page.clone(),
            None => storage.create_subdirectories()?.raw_extract_by_page,
        };

        for (index, text) in ctx.page_texts.iter().enumerate() {
            let page_num = index + 1;
            let file_name = extraction::page_file_name(page_num);
            storage.save_text(
                &raw_dir,
                &file_name,
                &extraction::format_page_text(page_num, text),
            )?;
            ctx.files_created.push(file_name);
        }
        Ok(())
    }
}

fn fail(progress: &dyn ProgressReporter, error: PipelineError) -> PipelineError {
    progress.report(ProgressEvent::Failed {
        error: error.to_string(),
    });
    error
}
