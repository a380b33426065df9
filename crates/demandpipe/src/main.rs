use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};

use demandpipe::config::{apply_env_overrides, load_config, Config};
use demandpipe::db::{job_repo, task_repo, Database, JobStatus};
use demandpipe::logging::{init_logging, LogFormat, DEFAULT_DIRECTIVE};
use demandpipe::pipeline::{LogProgress, Pipeline, PipelineConfig};
use demandpipe::worker::JobRunner;

#[derive(Parser, Debug)]
#[command(name = "demandpipe")]
#[command(version, about = "Extracts demand-file PDFs page by page and tracks job status", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding config and environment
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every outstanding task of a job
    Run {
        job_id: String,
    },
    /// Extract a single demand file without touching task or job status
    Extract {
        demand_file_id: String,
    },
    /// Create one task per unsummarised demand file of the job's note
    CreateTasks {
        job_id: String,
    },
    /// Print task counts for a job and reconcile its status
    Status {
        job_id: String,
    },
    /// Generate a DOCX demand letter from JSON metadata
    Letter {
        #[arg(short, long)]
        metadata: PathBuf,

        #[arg(short, long, default_value = "demand_note.docx")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv_path = dotenvy::dotenv().ok();

    if let Err(e) = init_logging(DEFAULT_DIRECTIVE, cli.log_format) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }
    if let Some(path) = dotenv_path {
        info!("Loaded environment from {}", path.display());
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Cli {
        config,
        database,
        command,
        ..
    } = cli;

    // Everything except the letter command works against the job store.
    let open_store = || -> anyhow::Result<(Database, Arc<PipelineConfig>)> {
        let config = resolve_config(config.as_deref())?;
        let db = open_database(database.as_deref(), &config)?;
        let pipeline_config =
            PipelineConfig::from_config(&config).context("Failed to resolve working directory")?;
        Ok((db, Arc::new(pipeline_config)))
    };

    match command {
        Command::Run { job_id } => {
            let (db, pipeline_config) = open_store()?;
            run_job(db, pipeline_config, &job_id)
        }
        Command::Extract { demand_file_id } => {
            let (db, pipeline_config) = open_store()?;
            let pipeline = Pipeline::new(db, pipeline_config);
            let outcome = pipeline
                .run(&demand_file_id, &LogProgress::new(demand_file_id.clone()))
                .with_context(|| format!("Extraction failed for demand file {}", demand_file_id))?;
            println!(
                "Extracted {} pages to {}",
                outcome.pages_extracted,
                outcome.base_path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::CreateTasks { job_id } => {
            let (db, _) = open_store()?;
            if job_repo::find_by_id(&db, &job_id)?.is_none() {
                bail!("Job not found: {}", job_id);
            }
            let created = task_repo::create_tasks_for_job(&db, &job_id)
                .with_context(|| format!("Failed to create tasks for job {}", job_id))?;
            println!("Created {} tasks for job {}", created, job_id);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { job_id } => {
            let (db, _) = open_store()?;
            let job = job_repo::find_by_id(&db, &job_id)?
                .with_context(|| format!("Job not found: {}", job_id))?;
            let counts = job_repo::task_counts(&db, &job_id)?;
            let status = job_repo::reconcile_status(&db, &job_id)?.unwrap_or(job.status);

            println!("Job {}: {}", job_id, status);
            println!(
                "  tasks: {} total, {} completed, {} failed, {} in progress, {} pending",
                counts.total, counts.completed, counts.failed, counts.in_progress, counts.pending
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Letter { metadata, output } => {
            let written = demandpipe::generate_letter(&metadata, &output).with_context(|| {
                format!("Failed to generate letter from {}", metadata.display())
            })?;
            println!("Demand note created: {}", written.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_job(
    db: Database,
    pipeline_config: Arc<PipelineConfig>,
    job_id: &str,
) -> anyhow::Result<ExitCode> {
    let runner = JobRunner::new(db, pipeline_config);

    let shutdown = runner.shutdown_flag();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing in-flight tasks...");
        shutdown.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl-C handler")?;

    let report = runner.run(job_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.status == JobStatus::Completed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    apply_env_overrides(config).context("Invalid environment override")
}

fn open_database(database: Option<&Path>, config: &Config) -> anyhow::Result<Database> {
    let path = database
        .map(Path::to_path_buf)
        .or_else(|| config.database_path())
        .context("No database path configured and no home directory found")?;

    info!("Using database {}", path.display());
    Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}
