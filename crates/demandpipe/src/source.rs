//! Locating a demand file's PDF on disk.
//!
//! Stored paths come from an upload service that may run with a different
//! filesystem root (`/uploads/...` on the server, a relative checkout
//! locally), so several candidate locations are tried in order.

use std::path::{Path, PathBuf};

use crate::error::ProcessError;

/// How many ancestors of the working directory are searched for
/// root-anchored paths.
const ANCESTOR_LEVELS: usize = 3;

/// Directories a stored path may be relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoots {
    pub uploads_base_dir: Option<PathBuf>,
    pub working_directory: PathBuf,
}

impl SearchRoots {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            uploads_base_dir: None,
            working_directory: working_directory.into(),
        }
    }

    pub fn with_uploads_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_base_dir = Some(dir.into());
        self
    }
}

/// Every location `stored` may refer to, most specific first, without duplicates.
///
/// Relative candidates are anchored at the working directory.
pub fn candidate_paths(stored: &str, roots: &SearchRoots) -> Vec<PathBuf> {
    let stripped = stored.trim_start_matches('/');
    let mut candidates = Vec::new();

    candidates.push(anchor(Path::new(stored), &roots.working_directory));

    if let Some(base) = &roots.uploads_base_dir {
        candidates.push(anchor(&base.join(stripped), &roots.working_directory));
    }

    if stored.starts_with('/') {
        candidates.push(roots.working_directory.join(stripped));
        for ancestor in roots
            .working_directory
            .ancestors()
            .skip(1)
            .take(ANCESTOR_LEVELS)
        {
            candidates.push(ancestor.join(stripped));
        }
    }

    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Resolves a stored PDF path to an existing file.
pub fn resolve_source_path(stored: &str, roots: &SearchRoots) -> Result<PathBuf, ProcessError> {
    let attempted = candidate_paths(stored, roots);

    if let Some(found) = attempted.iter().find(|p| p.is_file()) {
        log::debug!("Resolved source {} to {}", stored, found.display());
        return Ok(found.clone());
    }

    Err(ProcessError::SourceNotFound {
        original: stored.to_string(),
        attempted,
        working_directory: roots.working_directory.clone(),
    })
}

/// Reads the whole PDF into memory.
pub fn read_source(path: &Path) -> Result<Vec<u8>, ProcessError> {
    std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })
}

fn anchor(path: &Path, working_directory: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_directory.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.5").unwrap();
    }

    #[test]
    fn test_existing_absolute_path_wins() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("a.pdf");
        touch(&pdf);

        let roots = SearchRoots::new("/nowhere").with_uploads_base_dir("/also-nowhere");
        let resolved = resolve_source_path(pdf.to_str().unwrap(), &roots).unwrap();
        assert_eq!(resolved, pdf);
    }

    #[test]
    fn test_uploads_base_dir_strips_leading_slash() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("uploads/note-1/a.pdf");
        touch(&pdf);

        let roots = SearchRoots::new("/nowhere").with_uploads_base_dir(dir.path());
        let resolved = resolve_source_path("/uploads/note-1/a.pdf", &roots).unwrap();
        assert_eq!(resolved, pdf);
    }

    #[test]
    fn test_relative_path_is_anchored_at_working_directory() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("uploads/a.pdf");
        touch(&pdf);

        let roots = SearchRoots::new(dir.path());
        assert_eq!(resolve_source_path("uploads/a.pdf", &roots).unwrap(), pdf);
    }

    #[test]
    fn test_root_anchored_path_found_in_ancestor() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("uploads/a.pdf");
        touch(&pdf);
        let nested = dir.path().join("services/pipeline");
        std::fs::create_dir_all(&nested).unwrap();

        let roots = SearchRoots::new(&nested);
        assert_eq!(resolve_source_path("/uploads/a.pdf", &roots).unwrap(), pdf);
    }

    #[test]
    fn test_candidate_order() {
        let roots = SearchRoots::new("/srv/app/worker").with_uploads_base_dir("/data");
        let candidates = candidate_paths("/uploads/a.pdf", &roots);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/uploads/a.pdf"),
                PathBuf::from("/data/uploads/a.pdf"),
                PathBuf::from("/srv/app/worker/uploads/a.pdf"),
                PathBuf::from("/srv/app/uploads/a.pdf"),
                PathBuf::from("/srv/uploads/a.pdf"),
            ]
        );
    }

    #[test]
    fn test_relative_stored_path_skips_ancestor_search() {
        let roots = SearchRoots::new("/srv/app");
        let candidates = candidate_paths("uploads/a.pdf", &roots);
        assert_eq!(candidates, vec![PathBuf::from("/srv/app/uploads/a.pdf")]);
    }

    #[test]
    fn test_not_found_reports_every_attempt() {
        let dir = TempDir::new().unwrap();
        let roots = SearchRoots::new(dir.path()).with_uploads_base_dir(dir.path().join("base"));

        match resolve_source_path("/uploads/missing.pdf", &roots) {
            Err(ProcessError::SourceNotFound {
                original,
                attempted,
                working_directory,
            }) => {
                assert_eq!(original, "/uploads/missing.pdf");
                assert_eq!(attempted, candidate_paths("/uploads/missing.pdf", &roots));
                assert_eq!(working_directory, dir.path());
            }
            other => panic!("Expected SourceNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_is_not_a_source() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a.pdf")).unwrap();

        let roots = SearchRoots::new(dir.path());
        assert!(resolve_source_path("a.pdf", &roots).is_err());
    }

    #[test]
    fn test_read_source_missing_file() {
        let result = read_source(Path::new("/nonexistent/a.pdf"));
        assert!(matches!(result, Err(ProcessError::ReadDocument { .. })));
    }
}
