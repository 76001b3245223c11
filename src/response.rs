use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::error::AppError;

/// Envelope
///
/// The JSON shape of every response body: `success`, a human-readable `message`,
/// and either `data` (success) or an `error` code (failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Success response builder. Handlers return `ApiResult<T>`.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    envelope: Envelope<T>,
}

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            envelope: Envelope {
                success: true,
                message: message.into(),
                data,
                error: None,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn data(&self) -> Option<&T> {
        self.envelope.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.envelope.data
    }
}

impl ApiResponse<()> {
    /// A message-only success body (no `data` key).
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

// --- Pagination ---

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Raw `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 10, max 50).
    pub limit: Option<u32>,
}

/// Normalized pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

impl From<PageParams> for Pagination {
    fn from(params: PageParams) -> Self {
        Self::new(params.page, params.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals a client needs to render a pager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let limit = i64::from(pagination.limit);
        Self {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let p = Pagination::new(Some(0), Some(500));
        assert_eq!(p, Pagination { page: 1, limit: MAX_PAGE_SIZE });

        let p = Pagination::new(None, Some(0));
        assert_eq!(p.limit, 1);
    }

    #[test]
    fn pagination_offset_is_zero_based() {
        let p = Pagination::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn page_rounds_total_pages_up() {
        let page = Page::new(vec![1, 2, 3], Pagination::new(Some(1), Some(3)), 7);
        assert_eq!(page.total_pages, 3);

        let empty: Page<i32> = Page::new(vec![], Pagination::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn message_only_envelope_omits_data() {
        let json = serde_json::to_string(&ApiResponse::message("done").envelope).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"done"}"#);
    }
}
