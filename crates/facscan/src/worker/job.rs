use std::path::PathBuf;

use crate::extract::ExtractionOutcome;

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub source_path: PathBuf,
}

impl Job {
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path,
        }
    }
}

/// How a document left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Filed,
    ManualReview,
    /// Could not even be moved to manual review; the source is left in place.
    Failed,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub source_path: PathBuf,
    pub routing: Routing,
    pub output_path: Option<PathBuf>,
    pub outcome: Option<ExtractionOutcome>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn filed(job: &Job, output_path: PathBuf, outcome: ExtractionOutcome) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            routing: Routing::Filed,
            output_path: Some(output_path),
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn manual_review(
        job: &Job,
        output_path: PathBuf,
        outcome: Option<ExtractionOutcome>,
        reason: String,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            routing: Routing::ManualReview,
            output_path: Some(output_path),
            outcome,
            error: Some(reason),
        }
    }

    pub fn failure(job: &Job, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            routing: Routing::Failed,
            output_path: None,
            outcome: None,
            error: Some(error),
        }
    }

    pub fn is_filed(&self) -> bool {
        self.routing == Routing::Filed
    }
}
