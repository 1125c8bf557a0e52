//! OpenAPI documentation configuration.

use utoipa::OpenApi;
use vitals_types::api::{
    ErrorResponse, HealthResponse, IngestPayload, IngestResponse, IngestSectionResult,
};
use vitals_types::{MetricView, WorkoutSeries, WorkoutSummary};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        crate::api::data::ingest_data,
        crate::api::metrics::get_metric,
        crate::api::workouts::workouts_health,
        crate::api::workouts::get_workout,
        crate::api::workouts::list_workouts,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            IngestPayload,
            IngestResponse,
            IngestSectionResult,
            MetricView,
            WorkoutSummary,
            WorkoutSeries,
        )
    ),
    tags(
        (name = "ingest", description = "Health data ingestion"),
        (name = "metrics", description = "Metric queries"),
        (name = "workouts", description = "Workout queries"),
        (name = "System", description = "Service health")
    ),
    info(
        title = "Vitals Health Data API",
        version = "0.1.0",
        description = "REST API for ingesting and querying personal health metrics and workouts. \
                       The same data is available to agents over MCP at `/mcp`.",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
