use std::path::PathBuf;

use crate::config::{CompressionConfig, Config};
use crate::error::ConfigError;
use crate::processor::ZoneBounds;

pub struct PipelineConfig {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub manual_review_directory: PathBuf,
    pub debug_directory: Option<PathBuf>,
    pub branch: String,
    pub ocr_dpi: u32,
    pub zone: ZoneBounds,
    pub compression: CompressionConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            input_directory: PathBuf::from(&config.input_directory),
            output_directory: PathBuf::from(&config.output_directory),
            manual_review_directory: PathBuf::from(&config.manual_review_directory),
            debug_directory: config.debug_directory.as_ref().map(PathBuf::from),
            branch: config.branch.clone(),
            ocr_dpi: config.ocr.dpi,
            zone: ZoneBounds::try_from(config.zone)?,
            compression: config.compression.clone(),
        })
    }
}
