//! Workouts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::iso_timestamp;

/// A stored workout. Workouts are unique by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub workout_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i32,
    pub active_energy_burned: Option<f64>,
    /// The raw workout object as it was ingested
    pub payload: Value,
}

impl Workout {
    /// Duration rounded to whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (f64::from(self.duration_seconds) / 60.0).round() as i64
    }

    pub fn to_summary(&self) -> WorkoutSummary {
        WorkoutSummary {
            id: self.id.clone(),
            workout_type: self.workout_type.clone(),
            start_time: iso_timestamp(&self.start_time),
            end_time: iso_timestamp(&self.end_time),
            duration_minutes: self.duration_minutes(),
            calories_burned: self.active_energy_burned,
        }
    }

    /// Heart rate and route series from the stored payload.
    ///
    /// Missing series come back as empty arrays.
    pub fn series(&self) -> WorkoutSeries {
        let take = |key: &str| {
            self.payload
                .get(key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()))
        };
        WorkoutSeries {
            heart_rate_data: take("heartRateData"),
            heart_rate_recovery: take("heartRateRecovery"),
            route: take("route"),
        }
    }

    pub fn to_detail(&self) -> WorkoutDetail {
        let series = self.series();
        WorkoutDetail {
            summary: self.to_summary(),
            heart_rate_data: series.heart_rate_data,
            heart_rate_recovery: series.heart_rate_recovery,
            route: series.route,
        }
    }
}

/// Workout list entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkoutSummary {
    pub id: String,
    pub workout_type: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: i64,
    pub calories_burned: Option<f64>,
}

/// Time series attached to a workout (REST shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSeries {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub heart_rate_data: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub heart_rate_recovery: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub route: Value,
}

/// Summary plus series, as returned by the `get_workout_detail` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDetail {
    #[serde(flatten)]
    pub summary: WorkoutSummary,
    pub heart_rate_data: Value,
    pub heart_rate_recovery: Value,
    pub route: Value,
}

/// Filter for workout queries. Bounds apply to the start time and are
/// inclusive; results are always newest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkoutQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl WorkoutQuery {
    pub fn contains(&self, start: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *start >= from) && self.to.map_or(true, |to| *start <= to)
    }
}
