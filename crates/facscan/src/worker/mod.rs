pub mod batch;
pub mod job;
pub mod pool;
pub mod scanner;

pub use batch::{BatchRunner, BatchSummary};
pub use job::{Job, JobResult, Routing};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;
