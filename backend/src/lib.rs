//! Vitals backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::HeaderValue;
use axum::http::{header, HeaderName, Method};
use axum::{
    middleware,
    routing::{any, get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use vitals_types::HealthResponse;

pub mod api;
pub mod auth;
pub mod config;
pub mod dates;
pub mod fields;
pub mod ingest;
pub mod mcp;
pub mod openapi;
pub mod state;
pub mod storage;

use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, Vec::new())
}

/// Create the Axum application router with a given state and CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(state: AppState, cors_allowed_origins: Vec<String>) -> Router {
    // REST API, every route behind the api-key gate
    let api_router = Router::new()
        .route("/data", post(api::data::ingest_data))
        .route("/metrics/{selected_metric}", get(api::metrics::get_metric))
        .route("/workouts/health", get(api::workouts::workouts_health))
        .route("/workouts/{id}", get(api::workouts::get_workout))
        .route("/workouts", get(api::workouts::list_workouts))
        .layer(middleware::from_fn(auth::require_api_key));

    // Build main router
    Router::new()
        .route("/health", get(health))
        // MCP Streamable HTTP endpoint (has its own session management)
        .route("/mcp", any(api::mcp::mcp_endpoint))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(auth::API_KEY_HEADER),
                    HeaderName::from_static(api::mcp::MCP_SESSION_ID_HEADER),
                ])
                .expose_headers([HeaderName::from_static(api::mcp::MCP_SESSION_ID_HEADER)]);

            // If no origins specified, allow any origin
            // Otherwise, restrict to the specified origins
            if cors_allowed_origins.is_empty() {
                cors.allow_origin(Any)
            } else {
                let origins: Vec<HeaderValue> = cors_allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins).allow_credentials(true)
            }
        })
        .with_state(state)
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
