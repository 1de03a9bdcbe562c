use sqlx::PgPool;

use crate::services::photo_store::PhotoStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub photos: PhotoStore,
}

impl AppState {
    pub fn new(db: PgPool, photos: PhotoStore) -> Self {
        Self { db, photos }
    }
}
