use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Invalid page image: {0}")]
    InvalidImage(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("OCR returned no text")]
    EmptyText,

    #[error("Scanner failed: {0}")]
    Device(String),
}

impl ProcessError {
    /// True for the failures that mean the OCR oracle produced nothing usable.
    pub fn is_ocr_failure(&self) -> bool {
        matches!(self, Self::OcrFailed(_) | Self::EmptyText)
    }
}

/// Compression never blocks filing; callers log this and keep the original.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to run compressor '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compressor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Compressor produced no output at '{0}'")]
    MissingOutput(PathBuf),

    #[error("Failed to replace '{path}' with compressed copy: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free name left for: {0}")]
    FileExists(PathBuf),

    #[error("Name '{base_name}' in '{directory}' was claimed by another writer twice in a row")]
    FilesystemRace {
        directory: PathBuf,
        base_name: String,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, FacscanError>;
