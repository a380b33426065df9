pub mod filesystem;
pub mod layout;

pub use filesystem::{ExtractDirs, FileStorage, CHUNKS_DIR, RAW_EXTRACT_DIR};
pub use layout::{job_output_directory, sanitize_file_stem, OutputLayout, OutputRoots};
