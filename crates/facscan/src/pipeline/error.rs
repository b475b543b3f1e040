use thiserror::Error;

/// Anything that sends a document to manual review instead of filing it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Neither RUT nor invoice number could be read")]
    NoExtraction,
}

#[derive(Debug, Clone)]
pub enum PipelineWarning {
    CompressionFailed { error: String },
    FilingFailed { error: String },
}
