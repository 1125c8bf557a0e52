//! Workout API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;
use vitals_types::{ErrorResponse, WorkoutQuery, WorkoutSeries, WorkoutSummary};

use super::{api_error, parse_bound, storage_error, ApiError};
use crate::auth::Credential;
use crate::fields::filter_fields;
use crate::state::AppState;

/// Field projection parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectionParams {
    /// Comma-separated fields to keep
    pub include: Option<String>,
    /// Comma-separated fields to drop (ignored when `include` is set)
    pub exclude: Option<String>,
}

/// Query parameters for `GET /api/workouts`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutListParams {
    /// Inclusive lower bound on the start time
    pub start_date: Option<String>,
    /// Inclusive upper bound on the start time
    pub end_date: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
}

/// Liveness check for the workouts API.
#[utoipa::path(
    get,
    path = "/api/workouts/health",
    tag = "workouts",
    responses(
        (status = 200, description = "Workouts API is up", body = String)
    )
)]
pub async fn workouts_health() -> &'static str {
    "OK"
}

/// Get the heart rate and route series of one workout.
#[utoipa::path(
    get,
    path = "/api/workouts/{id}",
    tag = "workouts",
    params(
        ("id" = String, Path, description = "Workout ID"),
        ("api-key" = String, Header, description = "API key starting with `sk-`"),
        ProjectionParams
    ),
    responses(
        (status = 200, description = "Workout series", body = WorkoutSeries),
        (status = 401, description = "Missing or invalid api-key", body = ErrorResponse),
        (status = 404, description = "Workout not found", body = ErrorResponse)
    )
)]
pub async fn get_workout(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    Path(id): Path<String>,
    Query(params): Query<ProjectionParams>,
) -> Result<Json<Value>, ApiError> {
    let workout = state
        .storage()
        .get_workout(credential.as_str(), &id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))?;

    let series = serde_json::to_value(workout.series()).unwrap_or(Value::Null);
    Ok(Json(filter_fields(
        series,
        params.include.as_deref(),
        params.exclude.as_deref(),
    )))
}

/// List workouts, newest first.
#[utoipa::path(
    get,
    path = "/api/workouts",
    tag = "workouts",
    params(
        ("api-key" = String, Header, description = "API key starting with `sk-`"),
        WorkoutListParams
    ),
    responses(
        (status = 200, description = "Matching workouts", body = Vec<WorkoutSummary>),
        (status = 400, description = "Unparseable date bound", body = ErrorResponse),
        (status = 401, description = "Missing or invalid api-key", body = ErrorResponse)
    )
)]
pub async fn list_workouts(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    Query(params): Query<WorkoutListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let query = WorkoutQuery {
        from: parse_bound(params.start_date.as_deref())?,
        to: parse_bound(params.end_date.as_deref())?,
        limit: None,
    };

    let rows = state
        .storage()
        .query_workouts(credential.as_str(), &query)
        .await
        .map_err(storage_error)?;

    let projected = rows
        .iter()
        .map(|workout| {
            let summary = serde_json::to_value(workout.to_summary()).unwrap_or(Value::Null);
            filter_fields(summary, params.include.as_deref(), params.exclude.as_deref())
        })
        .collect();
    Ok(Json(projected))
}
