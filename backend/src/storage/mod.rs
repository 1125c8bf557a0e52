//! Storage layer for health metrics and workouts.

mod memory_storage;
mod postgres_storage;

pub use memory_storage::MemoryStorage;
pub use postgres_storage::PostgresStorage;

use async_trait::async_trait;
use vitals_types::{MetricQuery, MetricSample, MetricStats, Workout, WorkoutQuery};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for health data storage backends.
///
/// Every operation is scoped to the owner `token`; records written under one
/// token are never visible under another.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a metric sample, replacing units and payload if a sample with
    /// the same (token, name, date, source) exists.
    async fn upsert_metric(&self, token: &str, sample: &MetricSample) -> Result<()>;

    /// Insert a workout, replacing every field except the owner if a workout
    /// with the same id exists.
    async fn upsert_workout(&self, token: &str, workout: &Workout) -> Result<()>;

    /// Distinct metric names, ascending.
    async fn metric_names(&self, token: &str) -> Result<Vec<String>>;

    async fn query_metrics(&self, token: &str, query: &MetricQuery) -> Result<Vec<MetricSample>>;

    /// Sample count and date range for one metric.
    async fn metric_stats(&self, token: &str, name: &str) -> Result<MetricStats>;

    /// Workouts matching the query, newest first.
    async fn query_workouts(&self, token: &str, query: &WorkoutQuery) -> Result<Vec<Workout>>;

    async fn get_workout(&self, token: &str, id: &str) -> Result<Option<Workout>>;

    /// Distinct workout types, ascending.
    async fn workout_types(&self, token: &str) -> Result<Vec<String>>;
}
