use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use rn_common::{FetchOutcome, MessageDetail, MessageEnvelope};
use crate::{QueueError, RegistryQueueClient, Result};

/// Process-local registry queue with vendor poll semantics.
///
/// `fetch_next` returns the head without removing it; only `ack` dequeues.
/// Used in development mode and as a test double.
pub struct InMemoryRegistryQueue {
    name: String,
    messages: Mutex<VecDeque<MessageEnvelope>>,
    details: Mutex<HashMap<String, MessageDetail>>,
    acked: Mutex<Vec<String>>,
}

impl InMemoryRegistryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            details: Mutex::new(HashMap::new()),
            acked: Mutex::new(Vec::new()),
        }
    }

    /// Queue a message. It must carry an id: an unackable head would block
    /// every later message since `fetch_next` never removes it.
    pub fn enqueue(&self, envelope: MessageEnvelope) -> Result<()> {
        if envelope.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            return Err(QueueError::Config(format!(
                "refusing to enqueue {} message without an id",
                envelope.raw_type
            )));
        }
        self.messages.lock().push_back(envelope);
        Ok(())
    }

    pub fn insert_detail(&self, detail_ref: impl Into<String>, detail: MessageDetail) {
        self.details.lock().insert(detail_ref.into(), detail);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Ids acknowledged so far, in ack order
    pub fn acked_ids(&self) -> Vec<String> {
        self.acked.lock().clone()
    }
}

#[async_trait]
impl RegistryQueueClient for InMemoryRegistryQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn fetch_next(&self) -> Result<FetchOutcome> {
        let messages = self.messages.lock();
        match messages.front() {
            Some(envelope) => Ok(FetchOutcome::message(envelope.clone(), messages.len() as u64)),
            None => Ok(FetchOutcome::empty()),
        }
    }

    async fn ack(&self, id: &str) -> Result<()> {
        let mut messages = self.messages.lock();
        let position = messages
            .iter()
            .position(|m| m.id.as_deref() == Some(id));

        match position {
            Some(index) => {
                messages.remove(index);
                self.acked.lock().push(id.to_string());
                debug!(queue = %self.name, message_id = %id, "Message acknowledged");
                Ok(())
            }
            None => {
                warn!(queue = %self.name, message_id = %id, "ACK failed - message not found");
                Err(QueueError::NotFound(id.to_string()))
            }
        }
    }

    async fn fetch_detail(&self, detail_ref: &str) -> Result<MessageDetail> {
        self.details
            .lock()
            .get(detail_ref)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(format!("detail {}", detail_ref)))
    }
}
