use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_base_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_base_dir: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub stage_delay_ms: u64,
}

fn default_worker_count() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            uploads_base_dir: None,
            outputs_base_dir: None,
            worker_count: default_worker_count(),
            stage_delay_ms: 0,
        }
    }
}

impl Config {
    /// Configured database file, falling back to `~/.demandpipe/data/demandpipe.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}
