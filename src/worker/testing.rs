//! In-memory store and scripted processors for worker tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::store::{JobStore, StoreError};
use crate::models::job::ImageJob;
use crate::models::missing_person::ImageStatus;
use crate::services::image_processor::{ImageProcessor, ImageProcessorError, ProcessorProvider};

struct Record {
    id: Uuid,
    photo_reference: String,
    status: ImageStatus,
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    claim_calls: usize,
    writes: usize,
    peak_processing: usize,
    fail_claims: bool,
    ready_failures: u32,
    ready_attempts: u32,
}

/// Mirrors the Postgres claim semantics under a single lock.
#[derive(Default)]
pub(crate) struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, photo_reference: &str, status: ImageStatus) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().records.push(Record {
            id,
            photo_reference: photo_reference.to_string(),
            status,
        });
        id
    }

    pub(crate) fn insert_pending(&self, photo_reference: &str) -> Uuid {
        self.insert(photo_reference, ImageStatus::Pending)
    }

    fn with_record<T>(&self, id: Uuid, f: impl FnOnce(&Record) -> T) -> T {
        let inner = self.inner.lock().unwrap();
        let record = inner.records.iter().find(|r| r.id == id).expect("unknown job");
        f(record)
    }

    pub(crate) fn status(&self, id: Uuid) -> ImageStatus {
        self.with_record(id, |r| r.status)
    }

    pub(crate) fn photo_reference(&self, id: Uuid) -> String {
        self.with_record(id, |r| r.photo_reference.clone())
    }

    pub(crate) fn count(&self, status: ImageStatus) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.records.iter().filter(|r| r.status == status).count()
    }

    pub(crate) fn claim_calls(&self) -> usize {
        self.inner.lock().unwrap().claim_calls
    }

    pub(crate) fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Highest number of jobs ever in `processing` at once.
    pub(crate) fn peak_processing(&self) -> usize {
        self.inner.lock().unwrap().peak_processing
    }

    pub(crate) fn ready_attempts(&self) -> u32 {
        self.inner.lock().unwrap().ready_attempts
    }

    pub(crate) fn set_fail_claims(&self, fail: bool) {
        self.inner.lock().unwrap().fail_claims = fail;
    }

    pub(crate) fn fail_next_ready_updates(&self, count: u32) {
        self.inner.lock().unwrap().ready_failures = count;
    }
}

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn claim(&self, batch_size: usize) -> Result<Vec<ImageJob>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.claim_calls += 1;
        if inner.fail_claims {
            return Err(unavailable());
        }

        let mut claimed = Vec::new();
        for record in inner.records.iter_mut() {
            if claimed.len() == batch_size {
                break;
            }
            if record.status == ImageStatus::Pending {
                record.status = ImageStatus::Processing;
                claimed.push(ImageJob {
                    id: record.id,
                    photo_reference: record.photo_reference.clone(),
                });
            }
        }

        inner.writes += claimed.len();
        let processing = inner
            .records
            .iter()
            .filter(|r| r.status == ImageStatus::Processing)
            .count();
        inner.peak_processing = inner.peak_processing.max(processing);

        Ok(claimed)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let record = inner.records.iter_mut().find(|r| r.id == id);
        match record {
            Some(r) if r.status == ImageStatus::Processing => {
                r.status = ImageStatus::Failed;
                inner.writes += 1;
                Ok(())
            }
            _ => Err(StoreError::InvalidTransition {
                id,
                to: ImageStatus::Failed,
            }),
        }
    }

    async fn mark_ready(&self, id: Uuid, photo_url: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        inner.ready_attempts += 1;
        if inner.ready_failures > 0 {
            inner.ready_failures -= 1;
            return Err(unavailable());
        }

        let record = inner.records.iter_mut().find(|r| r.id == id);
        match record {
            Some(r)
                if r.status == ImageStatus::Processing
                    || (r.status == ImageStatus::Ready && r.photo_reference == photo_url) =>
            {
                r.status = ImageStatus::Ready;
                r.photo_reference = photo_url.to_string();
                inner.writes += 1;
                Ok(())
            }
            _ => Err(StoreError::InvalidTransition {
                id,
                to: ImageStatus::Ready,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    Succeed,
    Fail,
    Hang,
}

/// Processor whose outcome and latency are fixed up front.
pub(crate) struct ScriptedProcessor {
    behavior: Behavior,
    delay: Duration,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl ScriptedProcessor {
    pub(crate) fn new(behavior: Behavior) -> Arc<Self> {
        Self::with_delay(behavior, Duration::ZERO)
    }

    pub(crate) fn with_delay(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn url_for(target_id: &str) -> String {
        format!("https://img.test/missing-persons/{target_id}.jpg")
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    pub(crate) fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProcessor for ScriptedProcessor {
    async fn upload(&self, local_path: &Path, target_id: &str) -> Result<String, ImageProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(local_path.to_path_buf());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.behavior {
            Behavior::Succeed => Ok(Self::url_for(target_id)),
            Behavior::Fail => Err(ImageProcessorError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "image store hung up",
            ))),
            Behavior::Hang => std::future::pending().await,
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Hands out one shared [`ScriptedProcessor`], or refuses as if
/// credentials were missing.
pub(crate) struct ScriptedProvider {
    processor: Arc<ScriptedProcessor>,
    available: bool,
    acquisitions: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new(processor: Arc<ScriptedProcessor>) -> Arc<Self> {
        Arc::new(Self {
            processor,
            available: true,
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub(crate) fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            processor: ScriptedProcessor::new(Behavior::Succeed),
            available: false,
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub(crate) fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub(crate) fn processor(&self) -> &Arc<ScriptedProcessor> {
        &self.processor
    }
}

impl ProcessorProvider for ScriptedProvider {
    fn acquire(&self) -> Result<Arc<dyn ImageProcessor>, ImageProcessorError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(ImageProcessorError::MissingCredentials("R2_BUCKET"));
        }
        Ok(self.processor.clone())
    }
}
