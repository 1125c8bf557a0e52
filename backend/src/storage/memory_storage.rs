//! In-memory storage implementation.
//!
//! Used when no database is configured and by the test suite. Data lives only
//! as long as the process.

use super::{Result, Storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use vitals_types::{
    iso_timestamp, MetricQuery, MetricSample, MetricStats, SortOrder, Workout, WorkoutQuery,
};

/// Unique key of a metric sample.
type MetricKey = (String, String, DateTime<Utc>, String);

#[derive(Default)]
struct Tables {
    metrics: HashMap<MetricKey, MetricSample>,
    /// Workouts by id, with their owner token
    workouts: HashMap<String, (String, Workout)>,
}

/// Storage backend that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_limit<T>(mut rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
    rows
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_metric(&self, token: &str, sample: &MetricSample) -> Result<()> {
        let key = (
            token.to_string(),
            sample.name.clone(),
            sample.date,
            sample.source.clone(),
        );
        self.tables.write().await.metrics.insert(key, sample.clone());
        Ok(())
    }

    async fn upsert_workout(&self, token: &str, workout: &Workout) -> Result<()> {
        // The owner of an existing workout never changes
        self.tables
            .write()
            .await
            .workouts
            .entry(workout.id.clone())
            .and_modify(|(_, existing)| *existing = workout.clone())
            .or_insert_with(|| (token.to_string(), workout.clone()));
        Ok(())
    }

    async fn metric_names(&self, token: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let names: BTreeSet<&String> = tables
            .metrics
            .keys()
            .filter(|(owner, ..)| owner == token)
            .map(|(_, name, ..)| name)
            .collect();
        Ok(names.into_iter().cloned().collect())
    }

    async fn query_metrics(&self, token: &str, query: &MetricQuery) -> Result<Vec<MetricSample>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MetricSample> = tables
            .metrics
            .iter()
            .filter(|((owner, name, date, _), _)| {
                owner == token && *name == query.name && query.contains(date)
            })
            .map(|(_, sample)| sample.clone())
            .collect();

        rows.sort_by(|a, b| match query.order {
            SortOrder::Ascending => a.date.cmp(&b.date),
            SortOrder::Descending => b.date.cmp(&a.date),
        });
        Ok(apply_limit(rows, query.limit))
    }

    async fn metric_stats(&self, token: &str, name: &str) -> Result<MetricStats> {
        let tables = self.tables.read().await;
        let dates: Vec<&DateTime<Utc>> = tables
            .metrics
            .keys()
            .filter(|(owner, metric, ..)| owner == token && metric == name)
            .map(|(_, _, date, _)| date)
            .collect();

        Ok(MetricStats {
            metric_name: name.to_string(),
            count: dates.len() as i64,
            earliest_date: dates.iter().min().map(|d| iso_timestamp(d)),
            latest_date: dates.iter().max().map(|d| iso_timestamp(d)),
        })
    }

    async fn query_workouts(&self, token: &str, query: &WorkoutQuery) -> Result<Vec<Workout>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Workout> = tables
            .workouts
            .values()
            .filter(|(owner, workout)| owner == token && query.contains(&workout.start_time))
            .map(|(_, workout)| workout.clone())
            .collect();

        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(apply_limit(rows, query.limit))
    }

    async fn get_workout(&self, token: &str, id: &str) -> Result<Option<Workout>> {
        let tables = self.tables.read().await;
        Ok(tables
            .workouts
            .get(id)
            .filter(|(owner, _)| owner == token)
            .map(|(_, workout)| workout.clone()))
    }

    async fn workout_types(&self, token: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let types: BTreeSet<&String> = tables
            .workouts
            .values()
            .filter(|(owner, _)| owner == token)
            .map(|(_, workout)| &workout.workout_type)
            .collect();
        Ok(types.into_iter().cloned().collect())
    }
}
