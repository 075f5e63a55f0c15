use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Registry returned {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session not connected")]
    NotConnected,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed registry response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for QueueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return QueueError::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => QueueError::Protocol {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => QueueError::Transport(e.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}
