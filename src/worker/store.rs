use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::job::ImageJob;
use crate::models::missing_person::ImageStatus;

/// Persistence operations the worker needs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically move up to `batch_size` pending jobs to `processing` and
    /// return them. Never returns a job another claimer holds.
    async fn claim(&self, batch_size: usize) -> Result<Vec<ImageJob>, StoreError>;

    /// `processing -> failed`
    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError>;

    /// `processing -> ready`, recording the published URL. Safe to repeat
    /// with the same URL.
    async fn mark_ready(&self, id: Uuid, photo_url: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {id} cannot move to {to}: not in the expected state")]
    InvalidTransition { id: Uuid, to: ImageStatus },
}

/// [`JobStore`] backed by the `missing_persons` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim(&self, batch_size: usize) -> Result<Vec<ImageJob>, StoreError> {
        let limit = i64::try_from(batch_size).unwrap_or(i64::MAX);
        Ok(queries::claim_pending_jobs(&self.pool, limit).await?)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        if queries::mark_job_failed(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                id,
                to: ImageStatus::Failed,
            })
        }
    }

    async fn mark_ready(&self, id: Uuid, photo_url: &str) -> Result<(), StoreError> {
        if queries::mark_job_ready(&self.pool, id, photo_url).await? {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                id,
                to: ImageStatus::Ready,
            })
        }
    }
}
