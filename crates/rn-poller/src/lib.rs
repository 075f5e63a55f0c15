//! Registry Notification Poller
//!
//! Drains a vendor-hosted registry message queue within a wall-clock budget:
//! - MessageClassifier: vendor type-code tables mapped onto the canonical taxonomy
//! - RecencyFilter: drops notifications older than a caller-supplied cutoff
//! - NotificationPoller: fetch, ack, detail-fetch, classify, filter, accumulate
//!
//! The poller keeps no cursor between calls. Callers persist the newest
//! `created_at` they have seen and pass it back as `since`.

pub mod classifier;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod recency;

pub use classifier::MessageClassifier;
pub use error::PollError;
pub use poller::{NotificationPoller, PollerConfig, DEFAULT_TIME_BUDGET};
pub use recency::RecencyFilter;

pub use rn_common::{Classification, DomainNotification, NotificationType, PollExit, PollResult};

pub type Result<T> = std::result::Result<T, PollError>;
