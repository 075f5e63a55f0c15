use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, warn};

use rn_common::{FetchOutcome, MessageDetail, MessageEnvelope};
use crate::{QueueError, RegistryQueueClient, Result};

/// SQLite-backed registry queue for local development.
///
/// Mirrors vendor poll semantics: the oldest row is returned by
/// `fetch_next` until it is deleted by `ack`.
pub struct SqliteRegistryQueue {
    pool: Pool<Sqlite>,
    queue_name: String,
}

impl SqliteRegistryQueue {
    pub fn new(pool: Pool<Sqlite>, queue_name: impl Into<String>) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
        }
    }

    /// Create the queue tables
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registry_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT,
                queue_name TEXT NOT NULL,
                envelope TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_registry_messages_queue
            ON registry_messages (queue_name, seq)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registry_message_details (
                queue_name TEXT NOT NULL,
                detail_ref TEXT NOT NULL,
                detail TEXT NOT NULL,
                PRIMARY KEY (queue_name, detail_ref)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!(queue = %self.queue_name, "SQLite registry queue schema initialized");
        Ok(())
    }

    /// Queue a message. Rows without an id are refused: `fetch_next` keeps
    /// returning the oldest row until it is acked, and it could never be.
    pub async fn enqueue(&self, envelope: &MessageEnvelope) -> Result<()> {
        if envelope.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            return Err(QueueError::Config(format!(
                "refusing to enqueue {} message without an id",
                envelope.raw_type
            )));
        }
        let payload = serde_json::to_string(envelope)?;

        sqlx::query(
            "INSERT INTO registry_messages (id, queue_name, envelope, enqueued_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&envelope.id)
        .bind(&self.queue_name)
        .bind(&payload)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        debug!(
            queue = %self.queue_name,
            message_id = ?envelope.id,
            raw_type = %envelope.raw_type,
            "Message enqueued"
        );
        Ok(())
    }

    pub async fn insert_detail(&self, detail_ref: &str, detail: &MessageDetail) -> Result<()> {
        let payload = serde_json::to_string(detail)?;

        sqlx::query(
            r#"
            INSERT INTO registry_message_details (queue_name, detail_ref, detail)
            VALUES (?, ?, ?)
            ON CONFLICT (queue_name, detail_ref) DO UPDATE SET detail = excluded.detail
            "#,
        )
        .bind(&self.queue_name)
        .bind(detail_ref)
        .bind(&payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn backlog(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM registry_messages WHERE queue_name = ?")
            .bind(&self.queue_name)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl RegistryQueueClient for SqliteRegistryQueue {
    fn identifier(&self) -> &str {
        &self.queue_name
    }

    async fn fetch_next(&self) -> Result<FetchOutcome> {
        let queue_size = self.backlog().await?;
        if queue_size == 0 {
            return Ok(FetchOutcome::empty());
        }

        let row = sqlx::query(
            "SELECT envelope FROM registry_messages WHERE queue_name = ? ORDER BY seq LIMIT 1",
        )
        .bind(&self.queue_name)
        .fetch_optional(&self.pool)
        .await?;

        let envelope = match row {
            Some(row) => {
                let payload: String = row.get("envelope");
                Some(serde_json::from_str::<MessageEnvelope>(&payload)?)
            }
            None => None,
        };

        Ok(FetchOutcome { envelope, queue_size })
    }

    async fn ack(&self, id: &str) -> Result<()> {
        // Only the oldest row with this id, so replays of the same id stay queued
        let result = sqlx::query(
            r#"
            DELETE FROM registry_messages
            WHERE seq = (
                SELECT seq FROM registry_messages
                WHERE queue_name = ? AND id = ?
                ORDER BY seq LIMIT 1
            )
            "#,
        )
        .bind(&self.queue_name)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(
                message_id = %id,
                queue = %self.queue_name,
                "ACK failed - message not found or already deleted"
            );
            return Err(QueueError::NotFound(id.to_string()));
        }

        debug!(message_id = %id, queue = %self.queue_name, "Message acknowledged");
        Ok(())
    }

    async fn fetch_detail(&self, detail_ref: &str) -> Result<MessageDetail> {
        let row = sqlx::query(
            "SELECT detail FROM registry_message_details WHERE queue_name = ? AND detail_ref = ?",
        )
        .bind(&self.queue_name)
        .bind(detail_ref)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| QueueError::NotFound(format!("detail {}", detail_ref)))?;

        let payload: String = row.get("detail");
        Ok(serde_json::from_str(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_queue() -> SqliteRegistryQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = SqliteRegistryQueue::new(pool, "test-queue");
        queue.init_schema().await.unwrap();
        queue
    }

    #[tokio::test]
    async fn test_enqueue_fetch_ack() {
        let queue = create_test_queue().await;
        queue
            .enqueue(&MessageEnvelope::new("m1", "RENEWED").with_domain("example.com"))
            .await
            .unwrap();
        queue.enqueue(&MessageEnvelope::new("m2", "DELETED")).await.unwrap();

        let outcome = queue.fetch_next().await.unwrap();
        assert_eq!(outcome.queue_size, 2);
        let envelope = outcome.envelope.unwrap();
        assert_eq!(envelope.id.as_deref(), Some("m1"));
        assert_eq!(envelope.domain_names, vec!["example.com".to_string()]);

        queue.ack("m1").await.unwrap();
        let outcome = queue.fetch_next().await.unwrap();
        assert_eq!(outcome.queue_size, 1);
        assert_eq!(outcome.envelope.unwrap().id.as_deref(), Some("m2"));

        queue.ack("m2").await.unwrap();
        assert!(queue.fetch_next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_missing_id() {
        let queue = create_test_queue().await;
        let anonymous = MessageEnvelope {
            raw_type: "DELETED".to_string(),
            ..Default::default()
        };
        assert!(matches!(queue.enqueue(&anonymous).await, Err(QueueError::Config(_))));
        assert!(queue.fetch_next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ack_missing_message() {
        let queue = create_test_queue().await;
        assert!(matches!(queue.ack("ghost").await, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_detail_upsert() {
        let queue = create_test_queue().await;
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        queue.insert_detail("ord-1", &MessageDetail::at(first)).await.unwrap();
        queue.insert_detail("ord-1", &MessageDetail::at(second)).await.unwrap();

        assert_eq!(queue.fetch_detail("ord-1").await.unwrap().timestamp, second);
        assert!(queue.fetch_detail("ord-2").await.is_err());
    }
}
