//! Health data tools exposed over MCP.

use crate::auth::Credential;
use crate::dates::parse_date_lenient;
use crate::storage::{Storage, StorageError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use vitals_types::{MetricQuery, MetricView, SortOrder, WorkoutQuery, WorkoutSummary};

const DEFAULT_METRIC_LIMIT: i64 = 100;
const DEFAULT_WORKOUT_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Caller mistakes, as opposed to failures while running the tool.
    pub fn is_invalid_params(&self) -> bool {
        matches!(self, ToolError::InvalidParams(_) | ToolError::UnknownTool(_))
    }
}

#[derive(Debug, Deserialize)]
struct QueryMetricsArgs {
    metric_name: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetricNameArgs {
    metric_name: String,
}

#[derive(Debug, Deserialize)]
struct ListWorkoutsArgs {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WorkoutIdArgs {
    workout_id: String,
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Unparseable dates are ignored rather than rejected.
fn optional_date(raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.filter(|s| !s.is_empty()).and_then(parse_date_lenient)
}

fn limit_or(raw: Option<f64>, default: i64) -> i64 {
    raw.map(|n| n.max(0.0) as i64).unwrap_or(default)
}

/// Wrap a tool result in MCP text content.
fn text_content(result: &impl Serialize) -> Result<Value, ToolError> {
    Ok(json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(result)?
        }]
    }))
}

/// Tool definitions for `tools/list`.
pub fn tool_definitions() -> Value {
    let date_arg = |what: &str| {
        json!({
            "type": "string",
            "description": format!("{what} date in ISO format or YYYY-MM-DD")
        })
    };

    json!([
        {
            "name": "list_metric_names",
            "title": "List Metric Names",
            "description": "List all available metric names in the database",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "query_metrics",
            "title": "Query Metrics",
            "description": "Query health metrics by name and optional date range",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "metric_name": {
                        "type": "string",
                        "description": "The metric name to query (e.g., heart_rate, steps)"
                    },
                    "from": date_arg("Start"),
                    "to": date_arg("End"),
                    "limit": {
                        "type": "number",
                        "default": DEFAULT_METRIC_LIMIT,
                        "description": "Maximum number of records to return"
                    }
                },
                "required": ["metric_name"]
            }
        },
        {
            "name": "get_metric_stats",
            "title": "Get Metric Statistics",
            "description": "Get statistics (count, date range) for a specific metric",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "metric_name": {
                        "type": "string",
                        "description": "The metric name to get stats for"
                    }
                },
                "required": ["metric_name"]
            }
        },
        {
            "name": "list_workouts",
            "title": "List Workouts",
            "description": "List workouts with optional date range filter",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "from": date_arg("Start"),
                    "to": date_arg("End"),
                    "limit": {
                        "type": "number",
                        "default": DEFAULT_WORKOUT_LIMIT,
                        "description": "Maximum number of records to return"
                    }
                }
            }
        },
        {
            "name": "get_workout_detail",
            "title": "Get Workout Detail",
            "description": "Get detailed information about a specific workout including heart rate data and route",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "workout_id": {
                        "type": "string",
                        "description": "The workout ID to get details for"
                    }
                },
                "required": ["workout_id"]
            }
        },
        {
            "name": "get_workout_types",
            "title": "Get Workout Types",
            "description": "List all unique workout types in the database",
            "inputSchema": {"type": "object", "properties": {}}
        }
    ])
}

/// Tool implementations scoped to one credential.
pub struct HealthTools {
    storage: Arc<dyn Storage>,
    credential: Credential,
}

impl HealthTools {
    pub fn new(storage: Arc<dyn Storage>, credential: Credential) -> Self {
        Self {
            storage,
            credential,
        }
    }

    /// Run a tool and wrap its result as MCP content.
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let token = self.credential.as_str();

        match name {
            "list_metric_names" => {
                info!("MCP: Listing metric names");
                let names = self.storage.metric_names(token).await?;
                text_content(&names)
            }

            "query_metrics" => {
                let args: QueryMetricsArgs = parse_args(arguments)?;
                info!("MCP: Querying metric {}", args.metric_name);
                let query = MetricQuery {
                    from: optional_date(args.from.as_deref()),
                    to: optional_date(args.to.as_deref()),
                    order: SortOrder::Descending,
                    limit: Some(limit_or(args.limit, DEFAULT_METRIC_LIMIT)),
                    ..MetricQuery::named(args.metric_name)
                };
                let rows: Vec<MetricView> = self
                    .storage
                    .query_metrics(token, &query)
                    .await?
                    .iter()
                    .map(|sample| sample.to_view())
                    .collect();
                text_content(&rows)
            }

            "get_metric_stats" => {
                let args: MetricNameArgs = parse_args(arguments)?;
                info!("MCP: Getting stats for metric {}", args.metric_name);
                let stats = self.storage.metric_stats(token, &args.metric_name).await?;
                text_content(&stats)
            }

            "list_workouts" => {
                let args: ListWorkoutsArgs = parse_args(arguments)?;
                info!("MCP: Listing workouts");
                let query = WorkoutQuery {
                    from: optional_date(args.from.as_deref()),
                    to: optional_date(args.to.as_deref()),
                    limit: Some(limit_or(args.limit, DEFAULT_WORKOUT_LIMIT)),
                };
                let rows: Vec<WorkoutSummary> = self
                    .storage
                    .query_workouts(token, &query)
                    .await?
                    .iter()
                    .map(|workout| workout.to_summary())
                    .collect();
                text_content(&rows)
            }

            "get_workout_detail" => {
                let args: WorkoutIdArgs = parse_args(arguments)?;
                info!("MCP: Getting workout {}", args.workout_id);
                match self.storage.get_workout(token, &args.workout_id).await? {
                    Some(workout) => text_content(&workout.to_detail()),
                    None => Ok(json!({
                        "content": [{
                            "type": "text",
                            "text": json!({"error": "Workout not found"}).to_string()
                        }]
                    })),
                }
            }

            "get_workout_types" => {
                info!("MCP: Listing workout types");
                let types = self.storage.workout_types(token).await?;
                text_content(&types)
            }

            _ => {
                error!("MCP: Unknown tool: {}", name);
                Err(ToolError::UnknownTool(name.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_api_key;
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use vitals_types::{MetricSample, Workout};

    async fn seeded() -> Arc<dyn Storage> {
        let storage = MemoryStorage::new();
        for day in 1..=3 {
            storage
                .upsert_metric(
                    "sk-abc",
                    &MetricSample {
                        name: "steps".to_string(),
                        date: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
                        source: "Phone".to_string(),
                        units: Some("count".to_string()),
                        payload: json!({"qty": day * 1000}),
                    },
                )
                .await
                .unwrap();
        }
        storage
            .upsert_workout(
                "sk-abc",
                &Workout {
                    id: "run-1".to_string(),
                    workout_type: "Running".to_string(),
                    start_time: Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap(),
                    end_time: Utc.with_ymd_and_hms(2026, 3, 2, 6, 30, 0).unwrap(),
                    duration_seconds: 1800,
                    active_energy_burned: Some(250.0),
                    payload: json!({"route": [{"lat": 1.0, "lon": 2.0}]}),
                },
            )
            .await
            .unwrap();
        Arc::new(storage)
    }

    fn tools(storage: Arc<dyn Storage>, key: &str) -> HealthTools {
        HealthTools::new(storage, validate_api_key(Some(key)).unwrap())
    }

    /// Parse the JSON text inside an MCP content result.
    fn text_of(result: &Value) -> Value {
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_six_tools_are_defined() {
        let names: Vec<String> = tool_definitions()
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "list_metric_names",
                "query_metrics",
                "get_metric_stats",
                "list_workouts",
                "get_workout_detail",
                "get_workout_types"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_metric_names() {
        let result = tools(seeded().await, "sk-abc")
            .call("list_metric_names", &Value::Null)
            .await
            .unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(text_of(&result), json!(["steps"]));
    }

    #[tokio::test]
    async fn test_tools_are_scoped_to_credential() {
        let result = tools(seeded().await, "sk-other")
            .call("list_metric_names", &json!({}))
            .await
            .unwrap();
        assert_eq!(text_of(&result), json!([]));
    }

    #[tokio::test]
    async fn test_query_metrics_newest_first_with_limit() {
        let result = tools(seeded().await, "sk-abc")
            .call("query_metrics", &json!({"metric_name": "steps", "limit": 2}))
            .await
            .unwrap();
        let rows = text_of(&result);
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["date"], "2026-03-03T12:00:00.000Z");
        assert_eq!(rows[0]["payload"]["qty"], 3000);
    }

    #[tokio::test]
    async fn test_query_metrics_ignores_bad_dates() {
        let result = tools(seeded().await, "sk-abc")
            .call(
                "query_metrics",
                &json!({"metric_name": "steps", "from": "not a date", "to": "2026-03-02"}),
            )
            .await
            .unwrap();
        let rows = text_of(&result);
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["date"], "2026-03-01T12:00:00.000Z");
    }

    #[tokio::test]
    async fn test_metric_stats() {
        let result = tools(seeded().await, "sk-abc")
            .call("get_metric_stats", &json!({"metric_name": "steps"}))
            .await
            .unwrap();
        assert_eq!(
            text_of(&result),
            json!({
                "metric_name": "steps",
                "count": 3,
                "earliest_date": "2026-03-01T12:00:00.000Z",
                "latest_date": "2026-03-03T12:00:00.000Z"
            })
        );
    }

    #[tokio::test]
    async fn test_workout_tools() {
        let tools = tools(seeded().await, "sk-abc");

        let list = text_of(&tools.call("list_workouts", &json!({})).await.unwrap());
        assert_eq!(list[0]["id"], "run-1");
        assert_eq!(list[0]["duration_minutes"], 30);

        let detail = text_of(
            &tools
                .call("get_workout_detail", &json!({"workout_id": "run-1"}))
                .await
                .unwrap(),
        );
        assert_eq!(detail["workout_type"], "Running");
        assert_eq!(detail["route"], json!([{"lat": 1.0, "lon": 2.0}]));
        assert_eq!(detail["heart_rate_data"], json!([]));

        let types = text_of(&tools.call("get_workout_types", &json!({})).await.unwrap());
        assert_eq!(types, json!(["Running"]));
    }

    #[tokio::test]
    async fn test_unknown_workout() {
        let result = tools(seeded().await, "sk-abc")
            .call("get_workout_detail", &json!({"workout_id": "nope"}))
            .await
            .unwrap();
        assert_eq!(
            result["content"][0]["text"],
            r#"{"error":"Workout not found"}"#
        );
    }

    #[tokio::test]
    async fn test_bad_arguments_and_unknown_tool() {
        let tools = tools(seeded().await, "sk-abc");

        let err = tools.call("query_metrics", &json!({})).await.unwrap_err();
        assert!(err.is_invalid_params());

        let err = tools
            .call("get_workout_detail", &json!({"workout_id": 5}))
            .await
            .unwrap_err();
        assert!(err.is_invalid_params());

        let err = tools.call("drop_tables", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }
}
