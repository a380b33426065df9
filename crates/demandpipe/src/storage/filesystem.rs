use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Directory holding one framed text file per page.
pub const RAW_EXTRACT_DIR: &str = "raw_extract_by_page";
/// Directory reserved for the chunking stage that follows extraction.
pub const CHUNKS_DIR: &str = "chunks";

/// The directories created under a task's output base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractDirs {
    pub base: PathBuf,
    pub raw_extract_by_page: PathBuf,
    pub chunks: PathBuf,
}

/// Writes extraction output beneath one base directory.
pub struct FileStorage {
    base_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Self {
        Self {
            base_directory: base_directory.as_ref().to_path_buf(),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Creates the base directory and its `raw_extract_by_page` and `chunks`
    /// children. Existing directories are left alone.
    pub fn create_subdirectories(&self) -> Result<ExtractDirs, StorageError> {
        let dirs = ExtractDirs {
            base: self.base_directory.clone(),
            raw_extract_by_page: self.base_directory.join(RAW_EXTRACT_DIR),
            chunks: self.base_directory.join(CHUNKS_DIR),
        };

        ensure_directory(&dirs.base)?;
        ensure_directory(&dirs.raw_extract_by_page)?;
        ensure_directory(&dirs.chunks)?;

        Ok(dirs)
    }

    /// Writes `content` to `directory/file_name`, replacing any previous file.
    ///
    /// The text goes to a sibling temp file first and is renamed into place,
    /// so a reader never sees a half-written page.
    pub fn save_text(
        &self,
        directory: &Path,
        file_name: &str,
        content: &str,
    ) -> Result<PathBuf, StorageError> {
        ensure_directory(directory)?;

        let final_path = directory.join(file_name);
        let temp_path = directory.join(format!(".{}.tmp", file_name));

        let write_result = std::fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        write_result.map_err(|e| StorageError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StorageError::WriteFile {
                path: final_path.clone(),
                source: e,
            }
        })?;

        Ok(final_path)
    }
}

pub(crate) fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
