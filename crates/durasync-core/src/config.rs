//! Load and save the [`FoundationConfig`] document.

use std::fs;
use std::path::Path;

use durasync_types::{ConfigError, FoundationConfig};
use tracing::debug;
use validator::Validate;

/// Read `path`. A missing file yields the defaults.
///
/// Blocking; call it once at startup, before handing work to the runtime.
pub fn load_config(path: &Path) -> Result<FoundationConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file not found, using defaults");
        return Ok(FoundationConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::from_read_error(&e))?;
    let config: FoundationConfig = serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;
    config.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;
    Ok(config)
}

/// Validate and write `config` to `path` through a temp file and rename. Blocking.
pub fn save_config(path: &Path, config: &FoundationConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| ConfigError::from_io_error(&e))?;
        }
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}
