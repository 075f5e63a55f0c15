//! REST/JSON registry queue client.
//!
//! Covers the common shape of vendor poll APIs:
//! - `POST {session_path}` with username/password returns `{"token": ...}`
//! - `GET {next_message_path}` returns `{"count": n, "message": {...}}`
//! - `DELETE {ack_path}` dequeues the message named by `{id}`
//! - `GET {detail_path}` returns the order/event record for `{ref}`
//! - `DELETE {session_path}` logs out
//!
//! Vendors disagree on field names, so message parsing accepts the usual
//! variants (`id`/`messageId`, `type`/`code`, `domain`/`domains`, ...).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use rn_common::{FetchOutcome, MessageDetail, MessageEnvelope};
use rn_config::HttpQueueSettings;
use crate::{QueueError, RegistryQueueClient, Result};

pub struct HttpRegistryQueue {
    client: Client,
    name: String,
    base_url: String,
    base: Url,
    api_key: String,
    username: String,
    password: String,
    object_type: String,
    session_path: String,
    next_message_path: String,
    ack_path: String,
    detail_path: String,
    session_token: RwLock<Option<String>>,
}

impl HttpRegistryQueue {
    pub fn new(name: impl Into<String>, settings: &HttpQueueSettings) -> Result<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(QueueError::Config("base_url is required".to_string()));
        }

        let base = Url::parse(settings.base_url.trim())
            .map_err(|e| QueueError::Config(format!("invalid base_url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(QueueError::Config(format!("base_url {} cannot carry a path", base)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| QueueError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: name.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            base,
            api_key: settings.api_key.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            object_type: settings.object_type.clone(),
            session_path: settings.session_path.clone(),
            next_message_path: settings.next_message_path.clone(),
            ack_path: settings.ack_path.clone(),
            detail_path: settings.detail_path.clone(),
            session_token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fill `placeholder` in a path template with a vendor id.
    ///
    /// The id is percent-encoded as a single path segment, so `/`, `?`, `#`
    /// and spaces inside it can never address a different resource.
    fn resource_url(&self, template: &str, placeholder: &str, value: &str) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| QueueError::Config(format!("base_url {} cannot carry a path", self.base)))?;
            segments.pop_if_empty();
            for segment in template.split('/').filter(|s| !s.is_empty()) {
                if segment.contains(placeholder) {
                    segments.push(&segment.replace(placeholder, value));
                } else {
                    segments.push(segment);
                }
            }
        }
        Ok(url)
    }

    fn uses_session(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.session_token.read().is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        if let Some(token) = self.session_token.read().as_deref() {
            return Ok(request.bearer_auth(token));
        }
        if self.uses_session() {
            return Err(QueueError::NotConnected);
        }
        if self.api_key.is_empty() {
            Ok(request)
        } else {
            Ok(request.header("X-Api-Key", &self.api_key))
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(QueueError::Protocol {
            status: status.as_u16(),
            message: vendor_error_message(&body),
        })
    }
}

#[async_trait]
impl RegistryQueueClient for HttpRegistryQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<()> {
        if !self.uses_session() || self.is_connected() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url(&self.session_path))
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body: Value = Self::check_status(response).await?.json().await?;

        let token = string_field(&body, &["token", "sessionId", "session_id"]).ok_or_else(|| {
            QueueError::Protocol {
                status,
                message: "login response carried no session token".to_string(),
            }
        })?;

        *self.session_token.write() = Some(token);
        info!(queue = %self.name, "Registry session opened");
        Ok(())
    }

    async fn fetch_next(&self) -> Result<FetchOutcome> {
        let mut request = self.client.get(self.url(&self.next_message_path));
        if !self.object_type.is_empty() {
            request = request.query(&[("object_type", self.object_type.as_str())]);
        }

        let response = self.authorize(request)?.send().await?;
        let body: Value = Self::check_status(response).await?.json().await?;
        let outcome = parse_fetch_response(&body);

        debug!(
            queue = %self.name,
            queue_size = outcome.queue_size,
            has_message = outcome.envelope.is_some(),
            "Fetched next registry message"
        );
        Ok(outcome)
    }

    async fn ack(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.resource_url(&self.ack_path, "{id}", id)?);
        let response = self.authorize(request)?.send().await?;
        Self::check_status(response).await?;
        debug!(queue = %self.name, message_id = %id, "Message acknowledged");
        Ok(())
    }

    async fn fetch_detail(&self, detail_ref: &str) -> Result<MessageDetail> {
        let request = self
            .client
            .get(self.resource_url(&self.detail_path, "{ref}", detail_ref)?);
        let response = self.authorize(request)?.send().await?;
        let status = response.status().as_u16();
        let body: Value = Self::check_status(response).await?.json().await?;

        parse_detail_response(body).ok_or_else(|| QueueError::Protocol {
            status,
            message: format!("detail {} carried no timestamp", detail_ref),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        let token = self.session_token.write().take();
        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .client
            .delete(self.url(&self.session_path))
            .bearer_auth(token)
            .send()
            .await?;
        if let Err(e) = Self::check_status(response).await {
            warn!(queue = %self.name, error = %e, "Registry logout failed");
            return Err(e);
        }

        info!(queue = %self.name, "Registry session closed");
        Ok(())
    }
}

// ============================================================================
// Response parsing
// ============================================================================

fn parse_fetch_response(body: &Value) -> FetchOutcome {
    let message = ["message", "msg", "data"]
        .iter()
        .map(|key| &body[*key])
        .find(|v| v.is_object());

    let queue_size = ["count", "queueSize", "remaining"]
        .iter()
        .find_map(|key| as_u64(&body[*key]))
        .unwrap_or(if message.is_some() { 1 } else { 0 });

    FetchOutcome {
        envelope: message.map(parse_envelope),
        queue_size,
    }
}

fn parse_envelope(message: &Value) -> MessageEnvelope {
    let domain_names = match message.get("domains").and_then(Value::as_array) {
        Some(domains) => domains
            .iter()
            .filter_map(|d| d.as_str().map(String::from))
            .collect(),
        None => string_field(message, &["domain", "domainName", "name"])
            .into_iter()
            .collect(),
    };

    MessageEnvelope {
        id: string_field(message, &["id", "messageId", "msgId"]),
        raw_type: string_field(message, &["type", "code", "messageType"]).unwrap_or_default(),
        raw_text: string_field(message, &["text", "message", "description"]).unwrap_or_default(),
        domain_names,
        detail_ref: string_field(message, &["orderId", "detailRef", "order_id"]),
        approx_timestamp: ["date", "createdAt", "created_at"]
            .iter()
            .find_map(|key| message.get(*key).and_then(Value::as_str).and_then(parse_timestamp)),
        payload: Some(message.clone()),
    }
}

fn parse_detail_response(body: Value) -> Option<MessageDetail> {
    let record = if body["order"].is_object() { &body["order"] } else { &body };
    let timestamp = ["timestamp", "date", "createdAt", "completedAt"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str).and_then(parse_timestamp))?;

    Some(MessageDetail {
        timestamp,
        extra: Some(body),
    })
}

/// RFC 3339 first, then the zone-less formats vendors commonly emit (read as UTC).
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// First present key, accepting strings and numbers
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn vendor_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| string_field(&v, &["message", "error", "detail"]))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
