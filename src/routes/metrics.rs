use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every metric the service records.
pub fn describe_metrics() {
    metrics::describe_counter!("reports_created_total", "Missing person reports filed");
    metrics::describe_counter!(
        "image_jobs_claimed_total",
        "Photo jobs moved from pending to processing"
    );
    metrics::describe_counter!("image_jobs_ready_total", "Photos published successfully");
    metrics::describe_counter!("image_jobs_failed_total", "Photo jobs that ended in failed");
    metrics::describe_counter!(
        "image_jobs_stuck_total",
        "Photos published whose report could not be marked ready"
    );
    metrics::describe_histogram!(
        "image_processing_seconds",
        "Time from pickup to publication of a photo"
    );
    metrics::describe_gauge!("image_jobs_pending", "Reports waiting for photo processing");
}
