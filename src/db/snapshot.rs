//! Queue image persistence.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::storage::{PersistedTask, QueueSnapshot};

type QueueStateRow = (String, i64, i64, DateTime<Utc>, Option<String>);

impl super::Db {
    /// Replace the whole `queue_state` table in one transaction.
    ///
    /// The delete and the inserts commit together, so a reader (or a restart
    /// after a crash) sees either the previous image or this one.
    pub async fn replace_queue_state(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM queue_state")
            .execute(&mut *tx)
            .await?;

        for task in &snapshot.tasks {
            let metadata = serde_json::to_string(&task.metadata)
                .map_err(|e| Error::Other(format!("serialize metadata for {}: {e}", task.name)))?;
            sqlx::query(
                "INSERT INTO queue_state (task_name, position, priority, created_at, metadata)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&task.name)
            .bind(task.position as i64)
            .bind(task.priority)
            .bind(task.created_at)
            .bind(metadata)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load the saved image, ordered by persisted rank.
    pub async fn load_queue_state(&self) -> Result<QueueSnapshot> {
        let rows: Vec<QueueStateRow> = sqlx::query_as(
            "SELECT task_name, position, priority, created_at, metadata
             FROM queue_state ORDER BY position ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for (name, position, priority, created_at, metadata) in rows {
            let metadata = match metadata.as_deref() {
                None | Some("") => serde_json::Value::Null,
                Some(raw) => serde_json::from_str(raw)
                    .map_err(|e| Error::Other(format!("bad metadata for {name}: {e}")))?,
            };
            tasks.push(PersistedTask {
                name,
                position: position.max(0) as usize,
                priority,
                created_at,
                metadata,
            });
        }

        Ok(QueueSnapshot { tasks })
    }
}
