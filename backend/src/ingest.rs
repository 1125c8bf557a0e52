//! Ingestion of exporter payloads (`POST /api/data`).
//!
//! The payload's `data` object may carry a `metrics` and a `workouts` array.
//! Entries that cannot be interpreted are skipped; a storage failure aborts
//! only the section it happened in.

use crate::dates::parse_date_lenient;
use crate::storage::{Storage, StorageError};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{error, info};
use vitals_types::{IngestResponse, IngestSectionResult, MetricSample, Workout};

/// Source recorded for points that do not name one.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Type recorded for workouts that do not name one.
pub const UNKNOWN_WORKOUT_TYPE: &str = "Unknown";

/// Interpret a date field: numbers are epoch milliseconds, strings are
/// parsed leniently.
fn payload_date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => parse_date_lenient(s),
        _ => None,
    }
}

/// Samples described by one entry of `data.metrics`.
///
/// Entries without a name or data array yield nothing; points with a missing
/// or unparseable date are skipped.
pub fn metric_samples(metric: &Value) -> Vec<MetricSample> {
    let Some(name) = metric.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) else {
        return Vec::new();
    };
    let Some(points) = metric.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    let units = metric.get("units").and_then(Value::as_str).map(str::to_string);

    points
        .iter()
        .filter_map(|point| {
            let date = payload_date(point.get("date"))?;
            let source = point
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_SOURCE);
            Some(MetricSample {
                name: name.to_string(),
                date,
                source: source.to_string(),
                units: units.clone(),
                payload: point.clone(),
            })
        })
        .collect()
}

/// Round to whole seconds; `None` when the value does not fit an `i32`.
fn seconds_from_f64(value: f64) -> Option<i32> {
    let rounded = value.round();
    (rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX)).then_some(rounded as i32)
}

/// The workout described by one entry of `data.workouts`, if it has an id
/// and parseable start and end times.
pub fn parse_workout(entry: &Value) -> Option<Workout> {
    let id = match entry.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let start_time = payload_date(entry.get("start"))?;
    let end_time = payload_date(entry.get("end"))?;

    let duration_seconds = match entry.get("duration").and_then(Value::as_f64) {
        Some(duration) => seconds_from_f64(duration)?,
        // Whole seconds, rounded down
        None => {
            let millis = (end_time - start_time).num_milliseconds();
            i32::try_from(millis.div_euclid(1000)).ok()?
        }
    };

    Some(Workout {
        id,
        workout_type: entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_WORKOUT_TYPE)
            .to_string(),
        start_time,
        end_time,
        duration_seconds,
        active_energy_burned: entry
            .get("activeEnergy")
            .and_then(|energy| energy.get("qty"))
            .and_then(Value::as_f64),
        payload: entry.clone(),
    })
}

async fn ingest_metrics(
    storage: &dyn Storage,
    token: &str,
    metrics: &[Value],
) -> Result<usize, StorageError> {
    let mut stored = 0;
    for metric in metrics {
        for sample in metric_samples(metric) {
            storage.upsert_metric(token, &sample).await?;
            stored += 1;
        }
    }
    Ok(stored)
}

async fn ingest_workouts(
    storage: &dyn Storage,
    token: &str,
    workouts: &[Value],
) -> Result<usize, StorageError> {
    let mut stored = 0;
    for workout in workouts.iter().filter_map(parse_workout) {
        storage.upsert_workout(token, &workout).await?;
        stored += 1;
    }
    Ok(stored)
}

/// Ingest the `data` object of a payload under `token`.
pub async fn ingest(
    storage: &dyn Storage,
    token: &str,
    data: &Map<String, Value>,
) -> IngestResponse {
    let mut response = IngestResponse::default();

    if let Some(metrics) = data.get("metrics").and_then(Value::as_array) {
        response.metrics = Some(match ingest_metrics(storage, token, metrics).await {
            Ok(count) => {
                info!("Ingested {} metric sample(s)", count);
                IngestSectionResult::ok("Metrics ingested successfully")
            }
            Err(e) => {
                error!("Metrics insert error: {}", e);
                IngestSectionResult::failed(format!("Failed query: {}", e))
            }
        });
    }

    if let Some(workouts) = data.get("workouts").and_then(Value::as_array) {
        response.workouts = Some(match ingest_workouts(storage, token, workouts).await {
            Ok(count) => {
                info!("Ingested {} workout(s)", count);
                IngestSectionResult::ok("Workouts ingested successfully")
            }
            Err(e) => {
                error!("Workouts insert error: {}", e);
                IngestSectionResult::failed(e.to_string())
            }
        });
    }

    response
}

/// 200 when every reported section succeeded (or none was present), 500
/// when all failed, 207 otherwise.
pub fn ingest_status(response: &IngestResponse) -> StatusCode {
    let requested = [&response.metrics, &response.workouts]
        .into_iter()
        .flatten()
        .count();
    match response.failures() {
        0 => StatusCode::OK,
        failed if failed == requested => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::MULTI_STATUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use vitals_types::{MetricQuery, WorkoutQuery};

    #[test]
    fn test_metric_samples_skip_bad_points() {
        let metric = json!({
            "name": "heart_rate",
            "units": "count/min",
            "data": [
                {"date": "2026-02-05 14:30:00 -0800", "Avg": 71, "source": "Watch"},
                {"date": 1770000000000_i64, "Avg": 65},
                {"date": "yesterday", "Avg": 80},
                {"Avg": 90}
            ]
        });

        let samples = metric_samples(&metric);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].source, "Watch");
        assert_eq!(
            samples[0].date,
            DateTime::parse_from_rfc3339("2026-02-05T22:30:00Z").unwrap()
        );
        assert_eq!(samples[0].units.as_deref(), Some("count/min"));
        assert_eq!(samples[0].payload["Avg"], 71);
        assert_eq!(samples[1].source, UNKNOWN_SOURCE);
        assert_eq!(samples[1].date.timestamp_millis(), 1_770_000_000_000);
    }

    #[test]
    fn test_metric_without_name_or_data_is_ignored() {
        assert!(metric_samples(&json!({"data": [{"date": "2026-01-01"}]})).is_empty());
        assert!(metric_samples(&json!({"name": "steps"})).is_empty());
    }

    #[test]
    fn test_parse_workout_defaults() {
        let workout = parse_workout(&json!({
            "id": "w-1",
            "start": "2026-02-05 07:00:00",
            "end": "2026-02-05 07:45:30"
        }))
        .unwrap();
        assert_eq!(workout.workout_type, UNKNOWN_WORKOUT_TYPE);
        assert_eq!(workout.duration_seconds, 2730);
        assert_eq!(workout.active_energy_burned, None);
    }

    #[test]
    fn test_parse_workout_explicit_fields() {
        let workout = parse_workout(&json!({
            "id": "w-2",
            "name": "Cycling",
            "start": 1770000000000_i64,
            "end": 1770003600000_i64,
            "duration": 3500.4,
            "activeEnergy": {"qty": 512.5, "units": "kcal"}
        }))
        .unwrap();
        assert_eq!(workout.workout_type, "Cycling");
        assert_eq!(workout.duration_seconds, 3500);
        assert_eq!(workout.active_energy_burned, Some(512.5));
    }

    #[test]
    fn test_derived_duration_rounds_down() {
        let workout = parse_workout(&json!({
            "id": "w-3",
            "start": 1770000000000_i64,
            "end": 1770000001500_i64
        }))
        .unwrap();
        assert_eq!(workout.duration_seconds, 1);

        // End before start
        let workout = parse_workout(&json!({
            "id": "w-4",
            "start": 1770000001500_i64,
            "end": 1770000000000_i64
        }))
        .unwrap();
        assert_eq!(workout.duration_seconds, -2);
    }

    #[test]
    fn test_out_of_range_duration_is_skipped() {
        let huge = json!({
            "id": "w-5",
            "start": "2026-02-05",
            "end": "2026-02-05",
            "duration": 1e12
        });
        assert!(parse_workout(&huge).is_none());

        let span = json!({
            "id": "w-6",
            "start": "1900-01-01",
            "end": "2026-02-05"
        });
        assert!(parse_workout(&span).is_none());
    }

    #[test]
    fn test_parse_workout_rejects_incomplete_entries() {
        assert!(parse_workout(&json!({"start": "2026-02-05", "end": "2026-02-05"})).is_none());
        let empty_id = json!({"id": "", "start": "2026-02-05", "end": "2026-02-05"});
        assert!(parse_workout(&empty_id).is_none());
        let bad_start = json!({"id": "w", "start": "soon", "end": "2026-02-05"});
        assert!(parse_workout(&bad_start).is_none());
    }

    #[tokio::test]
    async fn test_ingest_reports_present_sections_only() {
        let storage = MemoryStorage::new();
        let data = json!({
            "metrics": [{"name": "steps", "data": [{"date": "2026-02-05", "qty": 10}]}]
        });

        let response = ingest(&storage, "sk-abc", data.as_object().unwrap()).await;
        assert_eq!(
            response.metrics,
            Some(IngestSectionResult::ok("Metrics ingested successfully"))
        );
        assert!(response.workouts.is_none());
        assert_eq!(ingest_status(&response), StatusCode::OK);

        let rows = storage
            .query_metrics("sk-abc", &MetricQuery::named("steps"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(storage
            .query_workouts("sk-abc", &WorkoutQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ingest_status() {
        let ok = || Some(IngestSectionResult::ok("fine"));
        let failed = || Some(IngestSectionResult::failed("boom"));

        let status = |metrics, workouts| ingest_status(&IngestResponse { metrics, workouts });
        assert_eq!(status(None, None), StatusCode::OK);
        assert_eq!(status(ok(), ok()), StatusCode::OK);
        assert_eq!(status(ok(), failed()), StatusCode::MULTI_STATUS);
        assert_eq!(status(failed(), None), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(failed(), failed()), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
