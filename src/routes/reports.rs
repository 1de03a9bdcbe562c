use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use image::ImageFormat;
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::error::{status_text, ApiError, ApiResult};
use crate::models::missing_person::NewMissingPerson;
use crate::models::report::{CreateReportRequest, ListQuery, Pagination, ReportResponse, WebResponse};

const ACCEPTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

fn envelope<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: T,
    pagination: Option<Pagination>,
) -> Json<WebResponse<T>> {
    Json(WebResponse {
        code: status.as_u16(),
        status: status_text(status),
        message: Some(message.to_string()),
        error: None,
        data: Some(data),
        pagination,
    })
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid uuid format".to_string()))
}

/// Form fields collected from a multipart submission.
#[derive(Default)]
struct Submission {
    request: CreateReportRequest,
    photo: Option<(Vec<u8>, ImageFormat)>,
}

async fn read_submission(mut multipart: Multipart) -> ApiResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            let format = image::guess_format(&data).map_err(|_| ApiError::UnsupportedMedia)?;
            if !ACCEPTED_FORMATS.contains(&format) {
                return Err(ApiError::UnsupportedMedia);
            }

            submission.photo = Some((data.to_vec(), format));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let value = value.trim().to_string();

        let request = &mut submission.request;
        match name.as_str() {
            "name" => request.name = value,
            "age" => {
                request.age = value
                    .parse()
                    .map_err(|_| ApiError::Validation("age: must be a whole number".to_string()))?
            }
            "description" => request.description = value,
            "last_seen" => request.last_seen = value,
            "contact" => request.contact = value,
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(submission)
}

/// POST /api/v1/missing-persons: file a report with a photo.
///
/// The photo is staged locally and the report is stored as `pending`; a
/// worker publishes the photo later.
pub async fn create_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<WebResponse<ReportResponse>>)> {
    let submission = read_submission(multipart).await?;

    submission
        .request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let (photo, format) = submission
        .photo
        .ok_or_else(|| ApiError::Validation("photo: is required".to_string()))?;

    let staged = state.photos.stage(&photo, format).await?;

    let request = submission.request;
    let new_report = NewMissingPerson {
        name: request.name,
        age: request.age,
        description: request.description,
        last_seen: request.last_seen,
        contact: request.contact,
        photo_reference: staged.clone(),
    };

    let report = match queries::create_report(&state.db, &new_report).await {
        Ok(report) => report,
        Err(e) => {
            if let Err(discard_err) = state.photos.discard(&staged).await {
                tracing::warn!(photo = %staged, error = %discard_err, "Failed to remove staged photo");
            }
            return Err(e.into());
        }
    };

    metrics::counter!("reports_created_total").increment(1);
    tracing::info!(report_id = %report.id, photo = %staged, "Report created");

    Ok((
        StatusCode::CREATED,
        envelope(
            StatusCode::CREATED,
            "Report created successfully. Image is being processed.",
            report.into(),
            None,
        ),
    ))
}

/// GET /api/v1/missing-persons/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WebResponse<ReportResponse>>> {
    let id = parse_id(&id)?;

    let report = queries::get_report(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("report {id} not found")))?;

    Ok(envelope(
        StatusCode::OK,
        "Report retrieved successfully",
        report.into(),
        None,
    ))
}

/// GET /api/v1/missing-persons?page=&limit=: published reports only.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<WebResponse<Vec<ReportResponse>>>> {
    let page = query.page();
    let limit = query.limit();

    let (reports, total) = queries::list_ready_reports(&state.db, page, limit).await?;
    let data = reports.into_iter().map(ReportResponse::from).collect();

    Ok(envelope(
        StatusCode::OK,
        "Reports retrieved successfully",
        data,
        Some(Pagination::new(page, limit, total)),
    ))
}

/// POST /api/v1/missing-persons/{id}/requeue: send a failed photo back to
/// the workers.
pub async fn requeue_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WebResponse<ReportResponse>>> {
    let id = parse_id(&id)?;

    if let Some(report) = queries::requeue_failed_job(&state.db, id).await? {
        tracing::info!(report_id = %id, "Photo job requeued");
        return Ok(envelope(
            StatusCode::OK,
            "Report requeued for image processing",
            report.into(),
            None,
        ));
    }

    match queries::get_report(&state.db, id).await? {
        Some(report) => Err(ApiError::Conflict(format!(
            "report {id} is {}; only failed reports can be requeued",
            report.image_status
        ))),
        None => Err(ApiError::NotFound(format!("report {id} not found"))),
    }
}
