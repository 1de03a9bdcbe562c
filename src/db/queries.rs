use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::job::ImageJob;
use crate::models::missing_person::{ImageStatus, MissingPerson, NewMissingPerson};

const REPORT_COLUMNS: &str = "id, name, age, description, last_seen, contact, photo_reference, \
                              image_status, created_at";

fn report_from_row(row: &PgRow) -> Result<MissingPerson, sqlx::Error> {
    let status: String = row.try_get("image_status")?;
    let image_status =
        ImageStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(MissingPerson {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        age: row.try_get("age")?,
        description: row.try_get("description")?,
        last_seen: row.try_get("last_seen")?,
        contact: row.try_get("contact")?,
        photo_reference: row.try_get("photo_reference")?,
        image_status,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a new report in `pending`
pub async fn create_report(
    pool: &PgPool,
    report: &NewMissingPerson,
) -> Result<MissingPerson, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO missing_persons
            (name, age, description, last_seen, contact, photo_reference, image_status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(&report.name)
    .bind(report.age)
    .bind(&report.description)
    .bind(&report.last_seen)
    .bind(&report.contact)
    .bind(&report.photo_reference)
    .fetch_one(pool)
    .await?;

    report_from_row(&row)
}

/// Get a report by ID
pub async fn get_report(pool: &PgPool, id: Uuid) -> Result<Option<MissingPerson>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {REPORT_COLUMNS} FROM missing_persons WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(report_from_row).transpose()
}

/// One page of published reports, newest first, plus the total count.
pub async fn list_ready_reports(
    pool: &PgPool,
    page: i64,
    limit: i64,
) -> Result<(Vec<MissingPerson>, i64), sqlx::Error> {
    let offset = (page.max(1) - 1) * limit;

    let total: i64 = sqlx::query(
        "SELECT COUNT(*) AS total FROM missing_persons WHERE image_status = 'ready'",
    )
    .fetch_one(pool)
    .await?
    .try_get("total")?;

    let rows = sqlx::query(&format!(
        r#"
        SELECT {REPORT_COLUMNS}
        FROM missing_persons
        WHERE image_status = 'ready'
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let reports = rows
        .iter()
        .map(report_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((reports, total))
}

/// Claim up to `limit` pending jobs and move them to `processing`.
///
/// Rows locked by another claimer are skipped rather than waited on, so
/// concurrent worker processes partition the pending set. Selection and the
/// status change commit together; any error drops the transaction, which
/// rolls it back.
pub async fn claim_pending_jobs(pool: &PgPool, limit: i64) -> Result<Vec<ImageJob>, sqlx::Error> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        r#"
        SELECT id, photo_reference
        FROM missing_persons
        WHERE image_status = 'pending'
        ORDER BY created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        tx.rollback().await?;
        return Ok(Vec::new());
    }

    let jobs = rows
        .iter()
        .map(|r| {
            Ok(ImageJob {
                id: r.try_get("id")?,
                photo_reference: r.try_get("photo_reference")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();

    sqlx::query(
        r#"
        UPDATE missing_persons
        SET image_status = 'processing'
        WHERE id = ANY($1)
        "#,
    )
    .bind(&ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(jobs)
}

/// Move a claimed job to `failed`. Returns false when the row was not in
/// `processing`.
pub async fn mark_job_failed(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE missing_persons
        SET image_status = 'failed'
        WHERE id = $1 AND image_status = 'processing'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record the published URL and move the job to `ready`.
///
/// Repeating the call with the same URL succeeds, so a worker can retry
/// after an ambiguous failure. Returns false when the row is in any other
/// state.
pub async fn mark_job_ready(pool: &PgPool, id: Uuid, photo_url: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE missing_persons
        SET photo_reference = $2,
            image_status = 'ready'
        WHERE id = $1
          AND (image_status = 'processing'
               OR (image_status = 'ready' AND photo_reference = $2))
        "#,
    )
    .bind(id)
    .bind(photo_url)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Administrative re-enqueue: `failed` back to `pending`.
pub async fn requeue_failed_job(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<MissingPerson>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE missing_persons
        SET image_status = 'pending'
        WHERE id = $1 AND image_status = 'failed'
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(report_from_row).transpose()
}

/// Number of reports currently in `status`.
pub async fn count_by_status(pool: &PgPool, status: ImageStatus) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM missing_persons WHERE image_status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?;

    row.try_get("total")
}
