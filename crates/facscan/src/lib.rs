pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{
    CompressionError, ConfigError, FacscanError, ProcessError, Result, StorageError, WorkerError,
};
pub use extract::{Extraction, ExtractionOutcome, FieldExtractor};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext};
pub use worker::{BatchRunner, BatchSummary, DirectoryScanner};
