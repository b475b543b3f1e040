//! Per-document orchestration: rasterize, crop, recognize, extract, route.

pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{DocumentState, PipelineContext};
pub use error::{PipelineError, PipelineWarning};
pub use runner::{Collaborators, Identification, Pipeline};
