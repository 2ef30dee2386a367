//! Append-only metric log.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::storage::MetricRecord;

impl super::Db {
    /// Append one metric row stamped with the current time.
    pub async fn insert_metric(&self, kind: &str, value: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics (metric_type, metric_value, recorded_at) VALUES (?, ?, ?)",
        )
        .bind(kind)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent metric rows, newest first.
    pub async fn recent_metrics(&self, limit: i64) -> Result<Vec<MetricRecord>> {
        let rows: Vec<(String, f64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT metric_type, metric_value, recorded_at FROM metrics
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(kind, value, recorded_at)| MetricRecord {
                kind,
                value,
                recorded_at,
            })
            .collect())
    }

    /// Delete metric rows recorded before `cutoff`. Returns rows removed.
    pub async fn prune_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metrics WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
