use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod logging;

// ============================================================================
// Queue Envelope Types
// ============================================================================

/// Normalized view of one raw entry in a registry message queue.
///
/// Built fresh by the queue client on every fetch and never mutated. The
/// `id` is only unique within the upstream queue it came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Queue message id used for acknowledgment. `None` for malformed entries.
    pub id: Option<String>,
    /// Vendor-specific type code describing the event kind
    pub raw_type: String,
    /// Human-readable body supplied by the vendor
    #[serde(default)]
    pub raw_text: String,
    /// Domains the event concerns, in vendor order
    #[serde(default)]
    pub domain_names: Vec<String>,
    /// Opaque reference used to fetch the authoritative event timestamp
    #[serde(default)]
    pub detail_ref: Option<String>,
    /// Timestamp carried on the envelope itself, if any
    #[serde(default)]
    pub approx_timestamp: Option<DateTime<Utc>>,
    /// Vendor raw message, kept for diagnostics only
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl MessageEnvelope {
    pub fn new(id: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            raw_type: raw_type.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = text.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_names.push(domain.into());
        self
    }

    pub fn with_detail_ref(mut self, detail_ref: impl Into<String>) -> Self {
        self.detail_ref = Some(detail_ref.into());
        self
    }

    pub fn with_approx_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.approx_timestamp = Some(timestamp);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Result of a single `fetch_next` call against a registry queue.
///
/// A `queue_size` of zero means the queue is empty and `envelope` is ignored.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub envelope: Option<MessageEnvelope>,
    pub queue_size: u64,
}

impl FetchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn message(envelope: MessageEnvelope, queue_size: u64) -> Self {
        Self {
            envelope: Some(envelope),
            queue_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue_size == 0
    }
}

/// Extended detail for a queued message, fetched by its detail reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDetail {
    /// Authoritative event timestamp
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

impl MessageDetail {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            extra: None,
        }
    }
}

// ============================================================================
// Canonical Notification Types
// ============================================================================

/// Canonical domain lifecycle event kinds, independent of vendor vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TransferIn,
    TransferOut,
    Renewed,
    Deleted,
}

impl NotificationType {
    pub const ALL: [NotificationType; 4] = [
        NotificationType::TransferIn,
        NotificationType::TransferOut,
        NotificationType::Renewed,
        NotificationType::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::Renewed => "renewed",
            Self::Deleted => "deleted",
        }
    }

    /// Text used when the vendor supplied an empty message body.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::TransferIn => "Domain transferred in",
            Self::TransferOut => "Domain transferred out",
            Self::Renewed => "Domain renewed",
            Self::Deleted => "Domain deleted",
        }
    }

    /// Parse the snake_case name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a raw vendor type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Applicable(NotificationType),
    NotApplicable,
}

impl Classification {
    pub fn notification_type(&self) -> Option<NotificationType> {
        match self {
            Self::Applicable(t) => Some(*t),
            Self::NotApplicable => None,
        }
    }
}

// ============================================================================
// Poll Output
// ============================================================================

/// A classified, recency-filtered registry notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub domains: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Vendor diagnostics keyed by source: `message` (raw queue entry) and
    /// `detail` (detail record). Never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl DomainNotification {
    /// Build a notification from an acked envelope and its authoritative timestamp.
    pub fn from_envelope(
        id: String,
        notification_type: NotificationType,
        envelope: MessageEnvelope,
        created_at: DateTime<Utc>,
    ) -> Self {
        let message = if envelope.raw_text.trim().is_empty() {
            notification_type.default_message().to_string()
        } else {
            envelope.raw_text
        };

        Self {
            id,
            notification_type,
            message,
            domains: envelope.domain_names,
            created_at,
            extra: None,
        }
        .with_extra("message", envelope.payload)
    }

    /// Keep the detail record's vendor payload alongside the raw message
    pub fn with_detail_extra(self, detail: Option<serde_json::Value>) -> Self {
        self.with_extra("detail", detail)
    }

    fn with_extra(mut self, key: &str, value: Option<serde_json::Value>) -> Self {
        if let Some(value) = value {
            let mut extra = match self.extra.take() {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            extra.insert(key.to_string(), value);
            self.extra = Some(serde_json::Value::Object(extra));
        }
        self
    }
}

/// Why a poll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollExit {
    LimitReached,
    #[default]
    QueueEmpty,
    BudgetExhausted,
}

/// Notifications collected by one poll invocation.
///
/// No cursor is kept between polls. Callers that want to avoid
/// re-processing must persist [`PollResult::latest_created_at`] themselves
/// and pass it back as `since`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    /// Oldest queue order first
    pub notifications: Vec<DomainNotification>,
    /// Backlog reported by the last queue read (0 when observed empty)
    pub count_remaining: u64,
    #[serde(skip)]
    pub exit: PollExit,
}

impl PollResult {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.notifications.iter().map(|n| n.created_at).max()
    }
}
