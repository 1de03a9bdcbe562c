use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::missing_person::ImageStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub photo_jobs: Option<PhotoJobCounts>,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct PhotoJobCounts {
    pub pending: i64,
    pub processing: i64,
    pub failed: i64,
}

/// GET /health: database probe plus photo backlog.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ComponentHealth {
                status: "error".to_string(),
                latency_ms: None,
            }
        }
    };

    let healthy = database.status == "ok";
    let photo_jobs = if healthy {
        photo_job_counts(&state).await
    } else {
        None
    };

    if let Some(counts) = &photo_jobs {
        metrics::gauge!("image_jobs_pending").set(counts.pending as f64);
    }

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            photo_jobs,
        },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn photo_job_counts(state: &AppState) -> Option<PhotoJobCounts> {
    let pending = queries::count_by_status(&state.db, ImageStatus::Pending).await.ok()?;
    let processing = queries::count_by_status(&state.db, ImageStatus::Processing).await.ok()?;
    let failed = queries::count_by_status(&state.db, ImageStatus::Failed).await.ok()?;

    Some(PhotoJobCounts {
        pending,
        processing,
        failed,
    })
}
