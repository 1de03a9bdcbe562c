use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::pipeline::{run_worker, Dispatched, JobPipeline};
use super::store::JobStore;
use crate::config::WorkerSettings;

/// Periodically claims pending jobs and hands them to a fixed worker pool.
///
/// A job holds one of `worker_count` slots from the moment it is claimed
/// until its worker finishes, so no more than `worker_count` jobs from this
/// process are ever in `processing` at once.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    pipeline: Arc<JobPipeline>,
    worker_count: usize,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>, pipeline: JobPipeline, settings: &WorkerSettings) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            worker_count: settings.worker_count.max(1),
            poll_interval: settings.poll_interval,
        }
    }

    /// Run until `shutdown` fires, then let the workers drain the queue and
    /// return once every in-flight job is finished.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            workers = self.worker_count,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Starting photo workers"
        );

        let (tx, rx) = mpsc::channel::<Dispatched>(self.worker_count);
        let rx = Arc::new(Mutex::new(rx));
        let slots = Arc::new(Semaphore::new(self.worker_count));

        let mut workers = JoinSet::new();
        for worker_id in 1..=self.worker_count {
            workers.spawn(run_worker(worker_id, self.pipeline.clone(), rx.clone()));
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, draining photo workers");
                    break;
                }
                _ = ticker.tick() => {
                    if !self.dispatch_batch(&tx, &slots).await {
                        break;
                    }
                }
            }
        }

        drop(tx);
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Photo worker exited abnormally");
            }
        }

        info!("Photo workers stopped");
    }

    /// Claim as many jobs as there are free slots and queue them. Returns
    /// false once the queue can no longer accept work.
    async fn dispatch_batch(&self, tx: &mpsc::Sender<Dispatched>, slots: &Arc<Semaphore>) -> bool {
        let free = slots.available_permits();
        if free == 0 {
            trace!("All photo workers busy");
            return true;
        }

        let jobs = match self.store.claim(free).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to claim photo jobs");
                return true;
            }
        };

        if jobs.is_empty() {
            trace!("No pending photos");
            return true;
        }

        metrics::counter!("image_jobs_claimed_total").increment(jobs.len() as u64);
        debug!(count = jobs.len(), "Claimed photo jobs");

        for job in jobs {
            let Ok(slot) = slots.clone().acquire_owned().await else {
                error!(job_id = %job.id, "Worker slots closed; job left in processing");
                return false;
            };

            if let Err(mpsc::error::SendError(dispatched)) = tx.send(Dispatched { job, _slot: slot }).await {
                error!(job_id = %dispatched.job.id, "Photo workers gone; job left in processing");
                return false;
            }
        }

        true
    }
}
