//! Bounded-queue worker pool: jobs are submitted over a channel sized to
//! the configured queue depth, and a single background task drains it
//! sequentially, running each job against the pipeline's `Extractor` under
//! a timeout and a per-job cancellation token.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vellum_core::{EngineError, EngineResult, ExtractionError, ExtractionJobId, UserId};

use crate::extractor::{ExtractedCandidate, ExtractionInput, Extractor};

/// Lifecycle of a submitted job.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionStatus {
    Queued,
    Running,
    Completed,
    TimedOut,
    Cancelled,
}

/// A finished job's output, retained until the caller reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub job_id: ExtractionJobId,
    pub candidates: Vec<ExtractedCandidate>,
    pub extraction_version: i32,
}

struct JobRecord {
    status: ExtractionStatus,
    result: Option<ExtractionResult>,
    cancel: CancellationToken,
}

struct Job {
    id: ExtractionJobId,
    input: ExtractionInput,
    cancel: CancellationToken,
}

/// Submits extraction jobs to a bounded channel and tracks their outcome.
/// One background worker drains the channel in submission order; raw
/// source stays with the caller, not the pipeline, so reprocessing never
/// needs this struct to have kept anything beyond the final candidates.
pub struct ExtractionPipeline {
    sender: mpsc::Sender<Job>,
    jobs: Arc<RwLock<HashMap<ExtractionJobId, JobRecord>>>,
    worker: tokio::task::JoinHandle<()>,
}

impl ExtractionPipeline {
    /// `queue_capacity` bounds the channel; `timeout` bounds each job's
    /// execution, after which it's marked `TimedOut` rather than left to
    /// run forever.
    pub fn new(extractor: Arc<dyn Extractor>, queue_capacity: usize, timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(queue_capacity);
        let jobs: Arc<RwLock<HashMap<ExtractionJobId, JobRecord>>> = Arc::new(RwLock::new(HashMap::new()));
        let worker_jobs = Arc::clone(&jobs);

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if job.cancel.is_cancelled() {
                    mark(&worker_jobs, job.id, ExtractionStatus::Cancelled, None);
                    continue;
                }
                mark(&worker_jobs, job.id, ExtractionStatus::Running, None);

                let run = extractor.extract(&job.input);
                tokio::select! {
                    _ = job.cancel.cancelled() => {
                        mark(&worker_jobs, job.id, ExtractionStatus::Cancelled, None);
                    }
                    outcome = tokio::time::timeout(timeout, run) => {
                        match outcome {
                            Ok(candidates) => {
                                let result = ExtractionResult {
                                    job_id: job.id,
                                    candidates,
                                    extraction_version: extractor.extraction_version(),
                                };
                                mark(&worker_jobs, job.id, ExtractionStatus::Completed, Some(result));
                            }
                            Err(_) => {
                                mark(&worker_jobs, job.id, ExtractionStatus::TimedOut, None);
                            }
                        }
                    }
                }
            }
        });

        Self { sender, jobs, worker }
    }

    /// Enqueue a job and return its identifier immediately. Fails with
    /// `CapacityExceeded` when the queue is full rather than blocking the
    /// caller — backpressure, not buffering.
    pub fn submit(&self, raw_text: String, user_id: UserId) -> EngineResult<ExtractionJobId> {
        let id = ExtractionJobId::now_v7();
        let cancel = CancellationToken::new();
        let job = Job {
            id,
            input: ExtractionInput { raw_text, user_id },
            cancel: cancel.clone(),
        };

        match self.sender.try_send(job) {
            Ok(()) => {
                let mut jobs = self.jobs.write().expect("job map lock poisoned");
                jobs.insert(
                    id,
                    JobRecord {
                        status: ExtractionStatus::Queued,
                        result: None,
                        cancel,
                    },
                );
                Ok(id)
            }
            Err(_) => Err(EngineError::Extraction(ExtractionError::CapacityExceeded)),
        }
    }

    /// Request cancellation. Idempotent; has no effect on a job that has
    /// already completed or timed out.
    pub fn cancel(&self, job_id: ExtractionJobId) -> EngineResult<()> {
        let jobs = self.jobs.read().expect("job map lock poisoned");
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::Extraction(ExtractionError::JobNotFound(job_id.to_string())))?;
        record.cancel.cancel();
        Ok(())
    }

    pub fn status(&self, job_id: ExtractionJobId) -> EngineResult<ExtractionStatus> {
        let jobs = self.jobs.read().expect("job map lock poisoned");
        jobs.get(&job_id)
            .map(|r| r.status.clone())
            .ok_or_else(|| EngineError::Extraction(ExtractionError::JobNotFound(job_id.to_string())))
    }

    /// `Ok(None)` while the job is still queued or running; the terminal
    /// states (`Completed`, `TimedOut`, `Cancelled`) all resolve here, with
    /// `Completed` the only one carrying candidates.
    pub fn result(&self, job_id: ExtractionJobId) -> EngineResult<Option<ExtractionResult>> {
        let jobs = self.jobs.read().expect("job map lock poisoned");
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| EngineError::Extraction(ExtractionError::JobNotFound(job_id.to_string())))?;
        match record.status {
            ExtractionStatus::Queued | ExtractionStatus::Running => Ok(None),
            ExtractionStatus::TimedOut => Err(EngineError::Extraction(ExtractionError::Timeout(job_id.to_string()))),
            ExtractionStatus::Cancelled => {
                Err(EngineError::Extraction(ExtractionError::Cancelled(job_id.to_string())))
            }
            ExtractionStatus::Completed => Ok(record.result.clone()),
        }
    }

    /// Stop accepting new jobs and wait for the worker to drain whatever
    /// was already in flight.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.worker.await;
    }
}

fn mark(
    jobs: &Arc<RwLock<HashMap<ExtractionJobId, JobRecord>>>,
    job_id: ExtractionJobId,
    status: ExtractionStatus,
    result: Option<ExtractionResult>,
) {
    let mut jobs = jobs.write().expect("job map lock poisoned");
    if let Some(record) = jobs.get_mut(&job_id) {
        record.status = status;
        if result.is_some() {
            record.result = result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RuleBasedExtractor;
    use std::time::Duration;

    fn pipeline(capacity: usize) -> ExtractionPipeline {
        ExtractionPipeline::new(Arc::new(RuleBasedExtractor::new()), capacity, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn submit_then_poll_until_completed() {
        let pipeline = pipeline(8);
        let job_id = pipeline
            .submit("We decided to use Postgres for storage.".to_string(), UserId::now_v7())
            .unwrap();

        let mut result = None;
        for _ in 0..50 {
            if let Some(r) = pipeline.result(job_id).unwrap() {
                result = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let result = result.expect("job should complete within the poll window");
        assert!(!result.candidates.is_empty());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_returns_capacity_exceeded() {
        let pipeline = pipeline(1);
        // `submit` never awaits, so back-to-back calls run before the
        // spawned worker gets a chance to dequeue the first job.
        pipeline.submit("first".to_string(), UserId::now_v7()).unwrap();
        let err = pipeline.submit("second".to_string(), UserId::now_v7()).unwrap_err();
        assert_eq!(err.as_code(), vellum_core::ErrorCode::CapacityExceeded);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let pipeline = pipeline(8);
        let err = pipeline.status(ExtractionJobId::now_v7()).unwrap_err();
        assert_eq!(err.as_code(), vellum_core::ErrorCode::NotFound);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_before_the_worker_picks_it_up_is_observed() {
        let pipeline = pipeline(8);
        let job_id = pipeline
            .submit("We decided to use Postgres for storage.".to_string(), UserId::now_v7())
            .unwrap();
        pipeline.cancel(job_id).unwrap();

        let mut final_status = None;
        for _ in 0..50 {
            let status = pipeline.status(job_id).unwrap();
            if matches!(status, ExtractionStatus::Cancelled | ExtractionStatus::Completed) {
                final_status = Some(status);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(final_status, Some(ExtractionStatus::Cancelled));
        pipeline.shutdown().await;
    }
}
