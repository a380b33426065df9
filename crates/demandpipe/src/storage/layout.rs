//! Where a task's extraction output lives.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::StorageError;
use crate::storage::filesystem::ensure_directory;

static RE_UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// Directory under the outputs root that holds one folder per job.
const OUTPUTS_DIR: &str = "outputs";

/// Stem used when a file name sanitizes to nothing.
const FALLBACK_STEM: &str = "document";

/// Directories an output path may be relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRoots {
    pub outputs_base_dir: Option<PathBuf>,
    pub working_directory: PathBuf,
}

impl OutputRoots {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            outputs_base_dir: None,
            working_directory: working_directory.into(),
        }
    }

    pub fn with_outputs_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outputs_base_dir = Some(dir.into());
        self
    }

    /// The configured outputs base, or the working directory.
    fn root(&self) -> &Path {
        self.outputs_base_dir
            .as_deref()
            .unwrap_or(&self.working_directory)
    }
}

/// Replaces characters that are unsafe in file names with `_` and drops the
/// last extension: `"a:b/c.pdf"` becomes `"a_b_c"`.
pub fn sanitize_file_stem(file_name: &str) -> String {
    let sanitized = RE_UNSAFE_CHARS.replace_all(file_name, "_");
    let stem = match sanitized.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => sanitized.as_ref(),
    };

    if stem.trim().is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// Output location inputs for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout<'a> {
    pub job_id: &'a str,
    pub file_name: &'a str,
    /// `Task.outputFilePath` from a previous run or set by the uploader.
    pub output_file_path: Option<&'a str>,
}

impl OutputLayout<'_> {
    /// Base output directory for the task.
    ///
    /// A stored output path is honoured. With an outputs base configured it
    /// is re-rooted under the base unless it already lies inside it. Without
    /// a stored path the result is
    /// `<root>/outputs/<job_id>/<sanitized stem>`.
    pub fn resolve(&self, roots: &OutputRoots) -> PathBuf {
        match self.output_file_path.filter(|p| !p.trim().is_empty()) {
            Some(stored) => {
                let stored_path = Path::new(stored);
                if let Some(base) = roots
                    .outputs_base_dir
                    .as_ref()
                    .filter(|base| !stored_path.starts_with(base))
                {
                    base.join(stored.trim_start_matches('/'))
                } else if stored_path.is_absolute() {
                    PathBuf::from(stored)
                } else {
                    roots.working_directory.join(stored)
                }
            }
            None => roots
                .root()
                .join(OUTPUTS_DIR)
                .join(self.job_id)
                .join(sanitize_file_stem(self.file_name)),
        }
    }
}

/// `<root>/outputs/<job_id>`, created if missing.
pub fn job_output_directory(job_id: &str, roots: &OutputRoots) -> Result<PathBuf, StorageError> {
    let dir = roots.root().join(OUTPUTS_DIR).join(job_id);
    ensure_directory(&dir)?;
    Ok(dir)
}
