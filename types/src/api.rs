//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

// ============================================================================
// Ingestion
// ============================================================================

/// Body of `POST /api/data` as sent by the exporter.
///
/// `data.metrics` is a list of `{name, units?, data: [{date, source?, ...}]}`
/// and `data.workouts` a list of `{id, name?, start, end, duration?,
/// activeEnergy?: {qty}}`. Both are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IngestPayload {
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: Value,
}

/// Outcome of ingesting one section (`metrics` or `workouts`) of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IngestSectionResult {
    pub success: bool,
    pub message: String,
}

impl IngestSectionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Response to `POST /api/data`. Only sections present in the request appear.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IngestResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<IngestSectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workouts: Option<IngestSectionResult>,
}

impl IngestResponse {
    /// Number of reported sections that failed.
    pub fn failures(&self) -> usize {
        [&self.metrics, &self.workouts]
            .into_iter()
            .flatten()
            .filter(|r| !r.success)
            .count()
    }
}

// ============================================================================
// Common
// ============================================================================

/// Liveness response for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HealthResponse {
    pub ok: bool,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
