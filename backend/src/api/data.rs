//! Ingestion API handler.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value;
use tracing::{debug, info};
use vitals_types::{ErrorResponse, IngestPayload, IngestResponse};

use super::api_error;
use crate::auth::Credential;
use crate::ingest::{ingest, ingest_status};
use crate::state::AppState;

fn payload_too_large() -> Response {
    api_error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large").into_response()
}

/// Ingest metrics and workouts from an exporter payload.
///
/// Each section present under `data` is reported separately.
#[utoipa::path(
    post,
    path = "/api/data",
    tag = "ingest",
    request_body = IngestPayload,
    params(
        ("api-key" = String, Header, description = "API key starting with `sk-`")
    ),
    responses(
        (status = 200, description = "All sections ingested", body = IngestResponse),
        (status = 207, description = "Some sections failed", body = IngestResponse),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid api-key", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 500, description = "All sections failed", body = IngestResponse)
    )
)]
pub async fn ingest_data(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    request: Request,
) -> Response {
    let limit = state.max_body_bytes();

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|length| length > limit as u64) {
        debug!("Rejecting ingest body of {:?} bytes", declared);
        return payload_too_large();
    }

    let bytes = match axum::body::to_bytes(request.into_body(), limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Failed to read ingest body: {}", e);
            return payload_too_large();
        }
    };

    let body: Value = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(_) => return api_error(StatusCode::BAD_REQUEST, "Invalid JSON").into_response(),
    };
    let Some(data) = body.get("data") else {
        return api_error(StatusCode::BAD_REQUEST, "Missing data field").into_response();
    };
    let Some(data) = data.as_object() else {
        return api_error(StatusCode::BAD_REQUEST, "Invalid data field").into_response();
    };

    info!("Ingesting payload of {} bytes", bytes.len());
    let response = ingest(state.storage().as_ref(), credential.as_str(), data).await;
    (ingest_status(&response), Json(response)).into_response()
}
