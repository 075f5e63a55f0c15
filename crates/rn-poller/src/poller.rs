//! Bounded-time drain of a registry message queue.
//!
//! One call to [`NotificationPoller::poll`] reads messages one at a time,
//! acks each one before looking at it, and turns the applicable ones into
//! [`DomainNotification`]s. The loop stops when the limit is reached, the
//! queue reports empty, or the wall-clock budget runs out, whichever comes
//! first. Only a failing queue read aborts the poll; every other failure
//! drops the message in hand and moves on.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use rn_common::{DomainNotification, MessageDetail, MessageEnvelope, PollExit, PollResult};
use rn_config::PollerSettings;
use rn_queue::RegistryQueueClient;

use crate::classifier::MessageClassifier;
use crate::metrics;
use crate::recency::RecencyFilter;
use crate::Result;

pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Checked before each fetch; an in-flight message is always finished
    pub time_budget: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }
}

impl PollerConfig {
    pub fn from_settings(settings: &PollerSettings) -> Self {
        Self {
            time_budget: settings.time_budget(),
        }
    }
}

#[derive(Debug, Default)]
struct PollStats {
    fetched: u64,
    acked: u64,
    ack_failures: u64,
    not_applicable: u64,
    detail_failures: u64,
    filtered: u64,
    malformed: u64,
}

impl PollStats {
    fn dropped(&self) -> u64 {
        self.ack_failures + self.not_applicable + self.detail_failures + self.filtered + self.malformed
    }
}

pub struct NotificationPoller {
    client: Arc<dyn RegistryQueueClient>,
    classifier: MessageClassifier,
    config: PollerConfig,
}

impl NotificationPoller {
    pub fn new(
        client: Arc<dyn RegistryQueueClient>,
        classifier: MessageClassifier,
        config: PollerConfig,
    ) -> Self {
        Self {
            client,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Drain up to `limit` notifications no older than `since`.
    ///
    /// Messages are acked before classification, so anything read during
    /// this call is gone from the vendor queue whether or not it was
    /// returned. Callers must not ask for more than they can process.
    pub async fn poll(&self, limit: NonZeroU32, since: Option<DateTime<Utc>>) -> Result<PollResult> {
        let filter = RecencyFilter::new(since);
        let span = info_span!(
            "registry_poll",
            queue = %self.client.identifier(),
            limit = limit.get(),
            since = ?filter.since(),
        );
        self.run(limit, filter).instrument(span).await
    }

    async fn run(&self, limit: NonZeroU32, filter: RecencyFilter) -> Result<PollResult> {
        let queue = self.client.identifier().to_string();
        let limit = limit.get() as usize;
        let started = Instant::now();

        let mut notifications: Vec<DomainNotification> = Vec::new();
        let mut count_remaining = 0u64;
        let mut stats = PollStats::default();

        let exit = loop {
            if notifications.len() >= limit {
                break PollExit::LimitReached;
            }
            if started.elapsed() >= self.config.time_budget {
                break PollExit::BudgetExhausted;
            }

            let outcome = self.client.fetch_next().await?;
            count_remaining = outcome.queue_size;
            metrics::set_queue_backlog(&queue, outcome.queue_size);

            if outcome.queue_size == 0 {
                break PollExit::QueueEmpty;
            }

            let Some(envelope) = outcome.envelope else {
                debug!(queue_size = outcome.queue_size, "Queue reported backlog but returned no message");
                continue;
            };
            stats.fetched += 1;
            metrics::record_fetched(&queue);

            let Some(id) = envelope.id.clone() else {
                warn!(raw_type = %envelope.raw_type, "Message without id cannot be acked, skipping");
                stats.malformed += 1;
                continue;
            };

            if let Err(e) = self.client.ack(&id).await {
                warn!(message_id = %id, error = %e, "Failed to ack message, skipping");
                stats.ack_failures += 1;
                metrics::record_ack_failure(&queue);
                continue;
            }
            stats.acked += 1;
            metrics::record_acked(&queue);

            let Some(notification_type) = self.classifier.classify(&envelope.raw_type).notification_type() else {
                debug!(message_id = %id, raw_type = %envelope.raw_type, "Message not applicable");
                stats.not_applicable += 1;
                metrics::record_not_applicable(&queue);
                continue;
            };

            let Some(detail) = self.resolve_detail(&id, &envelope).await else {
                stats.detail_failures += 1;
                metrics::record_detail_failure(&queue);
                continue;
            };
            let created_at = detail.timestamp;

            if !filter.keep(created_at) {
                debug!(
                    message_id = %id,
                    created_at = %created_at,
                    "Message older than cutoff, filtered"
                );
                stats.filtered += 1;
                metrics::record_filtered(&queue);
                continue;
            }

            debug!(
                message_id = %id,
                notification_type = %notification_type,
                created_at = %created_at,
                "Notification collected"
            );
            metrics::record_notification(&queue, notification_type.as_str());
            notifications.push(
                DomainNotification::from_envelope(id, notification_type, envelope, created_at)
                    .with_detail_extra(detail.extra),
            );
        };

        info!(
            collected = notifications.len(),
            fetched = stats.fetched,
            acked = stats.acked,
            dropped = stats.dropped(),
            count_remaining,
            elapsed_ms = started.elapsed().as_millis() as u64,
            exit = ?exit,
            "Registry poll finished"
        );

        Ok(PollResult {
            notifications,
            count_remaining,
            exit,
        })
    }

    /// Authoritative event time: the detail record when the envelope points
    /// at one, otherwise the envelope's own approximate timestamp.
    async fn resolve_detail(&self, id: &str, envelope: &MessageEnvelope) -> Option<MessageDetail> {
        match &envelope.detail_ref {
            Some(detail_ref) => match self.client.fetch_detail(detail_ref).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!(
                        message_id = %id,
                        detail_ref = %detail_ref,
                        error = %e,
                        "Detail fetch failed, dropping acked message"
                    );
                    None
                }
            },
            None => {
                if envelope.approx_timestamp.is_none() {
                    warn!(message_id = %id, "Message has no detail reference or timestamp, dropping");
                }
                envelope.approx_timestamp.map(MessageDetail::at)
            }
        }
    }
}
