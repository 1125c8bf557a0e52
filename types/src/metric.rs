//! Health metric samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::iso_timestamp;

/// A single stored metric data point.
///
/// Samples are unique per (owner token, name, date, source); re-ingesting the
/// same key replaces `units` and `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric name, e.g. `heart_rate` or `step_count`
    pub name: String,
    pub date: DateTime<Utc>,
    /// Device or app that recorded the sample
    pub source: String,
    pub units: Option<String>,
    /// The raw data point as it was ingested
    pub payload: Value,
}

impl MetricSample {
    /// The API representation of this sample.
    pub fn to_view(&self) -> MetricView {
        MetricView {
            name: self.name.clone(),
            date: iso_timestamp(&self.date),
            source: self.source.clone(),
            units: self.units.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// A metric sample as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct MetricView {
    pub name: String,
    /// ISO 8601 timestamp
    pub date: String,
    pub source: String,
    pub units: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
}

/// Sort direction for date-ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// SQL keyword for this ordering.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Filter for metric queries. Date bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub name: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl MetricQuery {
    /// All samples of `name`, oldest first.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: None,
            to: None,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    /// Whether `date` falls inside the query bounds.
    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *date >= from) && self.to.map_or(true, |to| *date <= to)
    }
}

/// Summary statistics for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub metric_name: String,
    pub count: i64,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_query_bounds_are_inclusive() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap();
        let query = MetricQuery {
            from: Some(from),
            to: Some(to),
            ..MetricQuery::named("steps")
        };

        assert!(query.contains(&from));
        assert!(query.contains(&to));
        assert!(!query.contains(&Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_view_renders_iso_date() {
        let sample = MetricSample {
            name: "heart_rate".to_string(),
            date: Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap(),
            source: "Watch".to_string(),
            units: Some("count/min".to_string()),
            payload: json!({"qty": 62}),
        };

        let view = sample.to_view();
        assert_eq!(view.date, "2026-02-05T00:00:00.000Z");
        assert_eq!(view.payload["qty"], 62);
    }
}
