//! Shared types for the Vitals health data server.
//!
//! This crate contains the stored health records and the REST API request and
//! response shapes, shared between the server and any client tooling.

use chrono::{DateTime, SecondsFormat, Utc};

/// Default port for the Vitals server.
pub const DEFAULT_PORT: u16 = 3000;

pub mod api;
pub mod metric;
pub mod workout;

// Re-export commonly used types
pub use api::{ErrorResponse, HealthResponse, IngestPayload, IngestResponse, IngestSectionResult};
pub use metric::{MetricQuery, MetricSample, MetricStats, MetricView, SortOrder};
pub use workout::{Workout, WorkoutDetail, WorkoutQuery, WorkoutSeries, WorkoutSummary};

/// Render a timestamp as ISO 8601 UTC with millisecond precision, e.g.
/// `2026-02-05T14:30:00.000Z`.
pub fn iso_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
