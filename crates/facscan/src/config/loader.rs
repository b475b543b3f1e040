use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::processor::zone::ZoneBounds;
use crate::sanitize;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.ocr.dpi == 0 || config.compression.dpi == 0 {
        return Err(ConfigError::Validation {
            message: "dpi values must be greater than zero".to_string(),
        });
    }

    if config.ocr.language.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "ocr.language must not be empty".to_string(),
        });
    }

    // Branch ends up verbatim in every filed name.
    if config.branch.is_empty() || sanitize::sanitize_filename(&config.branch) != config.branch {
        return Err(ConfigError::Validation {
            message: format!(
                "branch '{}' must be non-empty and contain only letters, digits, '-', '_' or '.'",
                config.branch
            ),
        });
    }

    ZoneBounds::try_from(config.zone)?;

    Ok(())
}
