use std::path::PathBuf;

use crate::extract::ExtractionOutcome;
use crate::processor::{CompressionReport, RecognitionResult, Zone};
use crate::worker::job::Job;

use super::error::PipelineWarning;

/// Where a document is in its run. `Filed` and `ManualReview` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Queued,
    Rasterized,
    ZoneCropped,
    OcrDone,
    Extracted,
    Filed,
    ManualReview,
}

impl DocumentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Filed | DocumentState::ManualReview)
    }
}

pub struct PipelineContext {
    pub job: Job,
    pub state: DocumentState,

    // Rendered first page; taken by the crop step
    pub page_image: Option<Vec<u8>>,

    // Taken by the recognition step
    pub zone: Option<Zone>,

    pub recognition: Option<RecognitionResult>,
    pub raw_text: Option<String>,
    pub outcome: Option<ExtractionOutcome>,
    pub compression: Option<CompressionReport>,

    /// Final location, in the output tree or the manual-review folder.
    pub output_path: Option<PathBuf>,

    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            state: DocumentState::Queued,
            page_image: None,
            zone: None,
            recognition: None,
            raw_text: None,
            outcome: None,
            compression: None,
            output_path: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn advance(&mut self, next: DocumentState) {
        tracing::trace!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_queued() {
        let ctx = PipelineContext::new(Job::new(PathBuf::from("/in/a.pdf")));
        assert_eq!(ctx.state, DocumentState::Queued);
        assert!(!ctx.state.is_terminal());
        assert!(ctx.output_path.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(DocumentState::Filed.is_terminal());
        assert!(DocumentState::ManualReview.is_terminal());
        assert!(!DocumentState::Extracted.is_terminal());
    }
}
