//! Seed file loading for the local SQLite queue.
//!
//! ```json
//! {
//!   "messages": [{ "id": "m1", "rawType": "RENEWED", "domainNames": ["example.com"], "detailRef": "ord-1" }],
//!   "details": { "ord-1": { "timestamp": "2024-01-10T00:00:00Z" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use rn_common::{MessageDetail, MessageEnvelope};
use rn_queue::sqlite::SqliteRegistryQueue;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub messages: Vec<MessageEnvelope>,
    pub details: BTreeMap<String, MessageDetail>,
}

impl SeedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))
    }

    /// Details first, so every seeded message can resolve its reference
    pub async fn apply(&self, queue: &SqliteRegistryQueue) -> Result<()> {
        for (detail_ref, detail) in &self.details {
            queue
                .insert_detail(detail_ref, detail)
                .await
                .with_context(|| format!("Failed to seed detail {}", detail_ref))?;
        }
        for envelope in &self.messages {
            queue
                .enqueue(envelope)
                .await
                .with_context(|| format!("Failed to seed {} message {:?}", envelope.raw_type, envelope.id))?;
        }

        info!(
            messages = self.messages.len(),
            details = self.details.len(),
            "Registry queue seeded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rn_poller::{MessageClassifier, NotificationPoller, NotificationType, PollerConfig};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn dev_queue() -> SqliteRegistryQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(rn_config::DEV_SQLITE_URL)
            .await
            .unwrap();
        let queue = SqliteRegistryQueue::new(pool, "registry");
        queue.init_schema().await.unwrap();
        queue
    }

    #[tokio::test]
    async fn test_seeded_queue_is_polled() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
  "messages": [
    {{ "id": "m1", "rawType": "TRANSFER_IN", "domainNames": ["example.com"], "detailRef": "ord-1" }},
    {{ "id": "m2", "rawType": "INVOICE_CREATED", "approxTimestamp": "2024-01-11T00:00:00Z" }},
    {{ "id": "m3", "rawType": "DELETED", "rawText": "Gone", "approxTimestamp": "2024-01-12T00:00:00Z" }}
  ],
  "details": {{ "ord-1": {{ "timestamp": "2024-01-10T08:00:00Z" }} }}
}}"#
        )
        .unwrap();

        let queue = Arc::new(dev_queue().await);
        SeedFile::from_path(file.path()).unwrap().apply(&queue).await.unwrap();

        let poller = NotificationPoller::new(queue.clone(), MessageClassifier::rest(), PollerConfig::default());
        let result = poller.poll(NonZeroU32::new(10).unwrap(), None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.notifications[0].notification_type, NotificationType::TransferIn);
        assert_eq!(
            result.notifications[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(result.notifications[1].message, "Gone");
        assert_eq!(result.count_remaining, 0);
    }

    #[tokio::test]
    async fn test_seed_without_id_is_rejected() {
        let seed: SeedFile =
            serde_json::from_str(r#"{ "messages": [{ "rawType": "RENEWED" }] }"#).unwrap();
        let queue = dev_queue().await;
        assert!(seed.apply(&queue).await.is_err());
    }
}
