use garde::Validate;
use serde::{Deserialize, Serialize};

use super::missing_person::MissingPerson;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

/// Text fields of a report submission (the photo travels separately).
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[garde(length(min = 1, max = 100))]
    pub name: String,

    #[garde(range(min = 1, max = 150))]
    pub age: i32,

    #[garde(length(min = 1))]
    pub description: String,

    #[garde(length(min = 1, max = 255))]
    pub last_seen: String,

    #[garde(length(min = 1, max = 100))]
    pub contact: String,
}

/// Response body for a single report.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub name: String,
    pub age: i32,
    pub description: String,
    pub last_seen: String,
    pub contact: String,
    pub photo_reference: String,
    pub image_status: String,
    pub created_at: String,
}

impl From<MissingPerson> for ReportResponse {
    fn from(report: MissingPerson) -> Self {
        Self {
            id: report.id.to_string(),
            name: report.name,
            age: report.age,
            description: report.description,
            last_seen: report.last_seen,
            contact: report.contact,
            photo_reference: report.photo_reference,
            image_status: report.image_status.to_string(),
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

/// Envelope shared by every API response, successful or not.
#[derive(Debug, Serialize)]
pub struct WebResponse<T: Serialize> {
    pub code: u16,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Raw `?page=&limit=` query. Kept as strings so junk input falls back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        positive_or(self.page.as_deref(), DEFAULT_PAGE)
    }

    pub fn limit(&self) -> i64 {
        positive_or(self.limit.as_deref(), DEFAULT_LIMIT)
    }
}

fn positive_or(raw: Option<&str>, default: i64) -> i64 {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n > 0 => n,
            _ => default,
        },
        None => default,
    }
}
