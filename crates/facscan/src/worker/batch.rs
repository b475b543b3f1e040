use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::WorkerError;
use crate::pipeline::Pipeline;
use crate::worker::job::{Job, JobResult, Routing};
use crate::worker::pool::WorkerPool;
use crate::worker::scanner::DirectoryScanner;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a batch run did.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub filed: usize,
    pub manual_review: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub results: Vec<JobResult>,
}

impl BatchSummary {
    fn record(&mut self, result: JobResult) {
        match result.routing {
            Routing::Filed => self.filed += 1,
            Routing::ManualReview => self.manual_review += 1,
            Routing::Failed => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn processed(&self) -> usize {
        self.filed + self.manual_review + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} filed, {} sent to manual review",
            self.filed, self.manual_review
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, " in {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Feeds a set of documents through a worker pool and collects the results.
pub struct BatchRunner {
    pipeline: Arc<Pipeline>,
    worker_count: usize,
    interrupted: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Self {
        Self {
            pipeline,
            worker_count,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag to set from a signal handler. Documents already handed to a
    /// worker still finish.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn run_directory(&self, scanner: &DirectoryScanner) -> Result<BatchSummary, WorkerError> {
        let jobs = scanner.scan()?;
        self.run(jobs)
    }

    pub fn run(&self, jobs: Vec<Job>) -> Result<BatchSummary, WorkerError> {
        let started = Instant::now();
        let total = jobs.len();
        let mut summary = BatchSummary::default();

        if total == 0 {
            info!("Nothing to process");
            return Ok(summary);
        }

        let pool = WorkerPool::with_shutdown_flag(
            Arc::clone(&self.pipeline),
            self.worker_count.min(total),
            Arc::clone(&self.interrupted),
        )?;

        let submitted = AtomicUsize::new(0);
        let submitting_done = AtomicBool::new(false);

        // Submission blocks once the queue is full, so it runs beside the
        // collector instead of before it.
        thread::scope(|scope| {
            scope.spawn(|| {
                for job in jobs {
                    if pool.submit(job).is_err() {
                        break;
                    }
                    submitted.fetch_add(1, Ordering::SeqCst);
                }
                submitting_done.store(true, Ordering::SeqCst);
            });

            let mut received = 0usize;
            loop {
                if let Some(result) = pool.recv_result_timeout(POLL_INTERVAL) {
                    summary.record(result);
                    received += 1;
                    continue;
                }

                let all_collected = submitting_done.load(Ordering::SeqCst)
                    && received >= submitted.load(Ordering::SeqCst);
                if all_collected {
                    break;
                }

                if pool.live_workers() == 0 {
                    // Workers stopped early; pick up anything sent before exit
                    while let Some(result) = pool.try_recv_result() {
                        summary.record(result);
                    }
                    break;
                }
            }
        });

        pool.wait();

        if summary.processed() < total {
            warn!(
                "Interrupted: {} of {} documents left in the input directory",
                total - summary.processed(),
                total
            );
        }

        summary.elapsed = started.elapsed();
        info!("Batch finished: {}", summary);
        Ok(summary)
    }
}
