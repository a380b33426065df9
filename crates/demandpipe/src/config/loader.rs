use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Applies `DEMANDPIPE_DATABASE`, `UPLOADS_BASE_DIR` / `OUTPUTS_BASE_DIR`
/// and their shared fallback `FILE_STORAGE_PATH` from the process environment.
pub fn apply_env_overrides(config: Config) -> Result<Config, ConfigError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Applies environment-style overrides read through `lookup`. Empty values are ignored.
pub fn apply_overrides<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let shared_storage = get("FILE_STORAGE_PATH");

    if let Some(path) = get("DEMANDPIPE_DATABASE") {
        config.database_path = Some(path);
    }
    if let Some(dir) = get("UPLOADS_BASE_DIR").or_else(|| shared_storage.clone()) {
        config.uploads_base_dir = Some(dir);
    }
    if let Some(dir) = get("OUTPUTS_BASE_DIR").or(shared_storage) {
        config.outputs_base_dir = Some(dir);
    }
    if let Some(raw) = get("DEMANDPIPE_WORKERS") {
        config.worker_count = raw.trim().parse().map_err(|_| ConfigError::Validation {
            message: format!("DEMANDPIPE_WORKERS must be a positive integer, got '{}'", raw),
        })?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    Ok(())
}
