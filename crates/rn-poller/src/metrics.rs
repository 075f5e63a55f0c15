//! Poll loop metrics
//!
//! Counters are labelled by queue identifier. No exporter is installed here;
//! the embedding process decides where they go.

use metrics::{counter, gauge};

pub fn record_fetched(queue: &str) {
    counter!("registry_poll.messages_fetched_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_acked(queue: &str) {
    counter!("registry_poll.acked_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_ack_failure(queue: &str) {
    counter!("registry_poll.ack_failures_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_not_applicable(queue: &str) {
    counter!("registry_poll.not_applicable_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_detail_failure(queue: &str) {
    counter!("registry_poll.detail_failures_total", "queue" => queue.to_string()).increment(1);
}

pub fn record_filtered(queue: &str) {
    counter!("registry_poll.filtered_total", "queue" => queue.to_string()).increment(1);
}

/// Record an accepted notification
pub fn record_notification(queue: &str, notification_type: &str) {
    counter!(
        "registry_poll.notifications_total",
        "queue" => queue.to_string(),
        "type" => notification_type.to_string()
    )
    .increment(1);
}

/// Backlog as last reported by the vendor
pub fn set_queue_backlog(queue: &str, size: u64) {
    gauge!("registry_poll.queue_backlog", "queue" => queue.to_string()).set(size as f64);
}
