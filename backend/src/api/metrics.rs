//! Metric query API handler.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;
use vitals_types::{ErrorResponse, MetricQuery, MetricView, SortOrder};

use super::{parse_bound, storage_error, ApiError};
use crate::auth::Credential;
use crate::fields::filter_fields;
use crate::state::AppState;

/// Query parameters for `GET /api/metrics/{selected_metric}`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricParams {
    /// Inclusive lower bound: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or epoch ms
    pub from: Option<String>,
    /// Inclusive upper bound, same formats as `from`
    pub to: Option<String>,
    /// Comma-separated fields to keep
    pub include: Option<String>,
    /// Comma-separated fields to drop (ignored when `include` is set)
    pub exclude: Option<String>,
}

/// Get all samples of one metric, oldest first.
#[utoipa::path(
    get,
    path = "/api/metrics/{selected_metric}",
    tag = "metrics",
    params(
        ("selected_metric" = String, Path, description = "Metric name, e.g. `heart_rate`"),
        ("api-key" = String, Header, description = "API key starting with `sk-`"),
        MetricParams
    ),
    responses(
        (status = 200, description = "Matching samples", body = Vec<MetricView>),
        (status = 400, description = "Unparseable date bound", body = ErrorResponse),
        (status = 401, description = "Missing or invalid api-key", body = ErrorResponse)
    )
)]
pub async fn get_metric(
    State(state): State<AppState>,
    Extension(credential): Extension<Credential>,
    Path(selected_metric): Path<String>,
    Query(params): Query<MetricParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let query = MetricQuery {
        from: parse_bound(params.from.as_deref())?,
        to: parse_bound(params.to.as_deref())?,
        order: SortOrder::Ascending,
        ..MetricQuery::named(selected_metric)
    };

    let rows = state
        .storage()
        .query_metrics(credential.as_str(), &query)
        .await
        .map_err(storage_error)?;

    let projected = rows
        .iter()
        .map(|sample| {
            let view = serde_json::to_value(sample.to_view()).unwrap_or(Value::Null);
            filter_fields(view, params.include.as_deref(), params.exclude.as_deref())
        })
        .collect();
    Ok(Json(projected))
}
