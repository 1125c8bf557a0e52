//! API handlers.

pub mod data;
pub mod mcp;
pub mod metrics;
pub mod workouts;

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use tracing::error;
use vitals_types::ErrorResponse;

use crate::dates::parse_date;
use crate::storage::StorageError;

/// Error half of a REST handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

pub(crate) fn storage_error(e: StorageError) -> ApiError {
    error!("Storage error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::with_details("Internal server error", e.to_string())),
    )
}

/// Parse an optional date range bound from a query string.
///
/// Missing or empty bounds mean "unbounded"; anything else must parse.
pub(crate) fn parse_bound(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(Some(raw))
            .map(Some)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid date")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(None).unwrap(), None);
        assert_eq!(parse_bound(Some("")).unwrap(), None);
        assert!(parse_bound(Some("2026-02-05")).unwrap().is_some());

        let (status, Json(body)) = parse_bound(Some("2026-13-01")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid date");
    }
}
