//! Registry message queue clients
//!
//! One [`RegistryQueueClient`] implementation exists per vendor wire
//! protocol. The poll loop only ever sees this trait:
//! - [`memory::InMemoryRegistryQueue`]: process-local queue for development and tests
//! - [`http::HttpRegistryQueue`]: REST/JSON vendor queue API over reqwest
//! - `sqlite::SqliteRegistryQueue`: embedded durable queue (feature `sqlite`)

use async_trait::async_trait;
use rn_common::{FetchOutcome, MessageDetail};

pub mod error;
pub mod http;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::QueueError;
pub use http::HttpRegistryQueue;
pub use memory::InMemoryRegistryQueue;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Access to a vendor-hosted queue of domain lifecycle messages.
///
/// Implementations own any authenticated session state. Callers open it
/// with [`connect`](Self::connect), run any number of polls, then close it
/// with [`disconnect`](Self::disconnect).
#[async_trait]
pub trait RegistryQueueClient: Send + Sync {
    /// Identifier used in logs and metrics
    fn identifier(&self) -> &str;

    /// Open the vendor session. Stateless protocols keep the default.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Read the next pending message together with the queue backlog.
    ///
    /// Returns a zero `queue_size` when the queue is empty. The message is
    /// not removed until [`ack`](Self::ack) is called with its id.
    async fn fetch_next(&self) -> Result<FetchOutcome>;

    /// Acknowledge (dequeue) a message by id
    async fn ack(&self, id: &str) -> Result<()>;

    /// Fetch extended detail, chiefly the authoritative event timestamp
    async fn fetch_detail(&self, detail_ref: &str) -> Result<MessageDetail>;

    /// Close the vendor session
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
