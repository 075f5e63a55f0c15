use rn_queue::QueueError;
use thiserror::Error;

/// Failures that abort a poll. Everything else degrades to "this message
/// did not become a notification".
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Queue read failed: {0}")]
    Queue(#[from] QueueError),
}
