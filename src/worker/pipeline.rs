use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit};
use tracing::{debug, error, info, warn};

use super::store::{JobStore, StoreError};
use crate::config::WorkerSettings;
use crate::models::job::ImageJob;
use crate::services::image_processor::{ImageProcessorError, ProcessorProvider};
use crate::services::photo_store::PhotoStore;

/// How a single job left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Published and recorded; carries the public URL.
    Ready(String),
    /// Marked `failed` (or the attempt to mark it failed was logged).
    Failed,
    /// Published, but the record could not be moved to `ready`. The job stays
    /// in `processing` until reconciled.
    Stuck(String),
}

/// A claimed job on its way to a worker. The slot is released when the
/// worker drops it after finishing.
pub(crate) struct Dispatched {
    pub(crate) job: ImageJob,
    pub(crate) _slot: OwnedSemaphorePermit,
}

/// Per-job steps: resolve the staged file, build a processor, publish,
/// record the result, clean up.
pub struct JobPipeline {
    store: Arc<dyn JobStore>,
    processors: Arc<dyn ProcessorProvider>,
    photos: PhotoStore,
    upload_timeout: Duration,
    ready_update_attempts: u32,
    ready_update_backoff: Duration,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        processors: Arc<dyn ProcessorProvider>,
        photos: PhotoStore,
        settings: &WorkerSettings,
    ) -> Self {
        Self {
            store,
            processors,
            photos,
            upload_timeout: settings.upload_timeout,
            ready_update_attempts: settings.ready_update_attempts.max(1),
            ready_update_backoff: settings.ready_update_backoff,
        }
    }

    /// Run one job to completion. Every failure ends in a status write or a
    /// log line; nothing is returned as an error.
    pub async fn process(&self, worker_id: usize, job: &ImageJob) -> JobOutcome {
        info!(worker_id, job_id = %job.id, "Processing photo");
        let start = Instant::now();

        let local_path = match self.photos.path_for(&job.photo_reference) {
            Ok(path) => path,
            Err(e) => {
                error!(worker_id, job_id = %job.id, error = %e, "Staged photo cannot be located");
                return self.fail(worker_id, job).await;
            }
        };

        let processor = match self.processors.acquire() {
            Ok(processor) => processor,
            Err(e) => {
                error!(worker_id, job_id = %job.id, error = %e, "Image processor unavailable");
                return self.fail(worker_id, job).await;
            }
        };

        let target_id = job.id.to_string();
        let upload = tokio::time::timeout(
            self.upload_timeout,
            processor.upload(&local_path, &target_id),
        )
        .await
        .unwrap_or(Err(ImageProcessorError::Timeout(self.upload_timeout)));

        let photo_url = match upload {
            Ok(url) => url,
            Err(e) => {
                error!(worker_id, job_id = %job.id, error = %e, "Photo upload failed");
                return self.fail(worker_id, job).await;
            }
        };

        if !self.record_ready(worker_id, job, &photo_url).await {
            metrics::counter!("image_jobs_stuck_total").increment(1);
            return JobOutcome::Stuck(photo_url);
        }

        if let Err(e) = self.photos.discard(&job.photo_reference).await {
            warn!(worker_id, job_id = %job.id, error = %e, "Failed to remove staged photo");
        }

        metrics::counter!("image_jobs_ready_total").increment(1);
        metrics::histogram!("image_processing_seconds").record(start.elapsed().as_secs_f64());

        info!(
            worker_id,
            job_id = %job.id,
            photo_url = %photo_url,
            duration_ms = start.elapsed().as_millis() as u64,
            "Photo published"
        );

        JobOutcome::Ready(photo_url)
    }

    async fn fail(&self, worker_id: usize, job: &ImageJob) -> JobOutcome {
        metrics::counter!("image_jobs_failed_total").increment(1);

        if let Err(e) = self.store.mark_failed(job.id).await {
            error!(worker_id, job_id = %job.id, error = %e, "Failed to mark job failed");
        }

        JobOutcome::Failed
    }

    /// Retry the `ready` write a bounded number of times. The write is
    /// idempotent, so a retry after an ambiguous error is safe.
    async fn record_ready(&self, worker_id: usize, job: &ImageJob, photo_url: &str) -> bool {
        for attempt in 1..=self.ready_update_attempts {
            match self.store.mark_ready(job.id, photo_url).await {
                Ok(()) => return true,
                Err(e @ StoreError::InvalidTransition { .. }) => {
                    error!(worker_id, job_id = %job.id, error = %e, "Job changed state during upload");
                    break;
                }
                Err(e) => {
                    warn!(
                        worker_id,
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "Failed to record published photo"
                    );
                    if attempt < self.ready_update_attempts {
                        tokio::time::sleep(self.ready_update_backoff * attempt).await;
                    }
                }
            }
        }

        error!(
            worker_id,
            job_id = %job.id,
            photo_url = %photo_url,
            "Photo published but report not updated; reconciliation needed"
        );
        false
    }
}

/// One long-lived worker: take a job, finish it, repeat until the queue is
/// closed and empty.
pub(crate) async fn run_worker(
    worker_id: usize,
    pipeline: Arc<JobPipeline>,
    queue: Arc<Mutex<mpsc::Receiver<Dispatched>>>,
) {
    debug!(worker_id, "Photo worker started");

    loop {
        let next = { queue.lock().await.recv().await };
        let Some(dispatched) = next else {
            break;
        };

        pipeline.process(worker_id, &dispatched.job).await;
        drop(dispatched);
    }

    debug!(worker_id, "Photo worker stopped");
}
