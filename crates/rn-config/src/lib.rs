//! Registry Poller Configuration
//!
//! TOML-based configuration with environment variable overrides.

use rn_common::NotificationType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Queue opened in dev mode: private to the process, empty until seeded
pub const DEV_SQLITE_URL: &str = "sqlite::memory:";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poller: PollerSettings,
    pub queue: QueueSettings,
    pub classifier: ClassifierSettings,

    /// Use a throwaway in-memory SQLite queue regardless of `queue.type`
    pub dev_mode: bool,
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Wall-clock ceiling for one poll invocation
    pub time_budget_secs: u64,
    /// Limit used when the caller does not pass one
    pub default_limit: u32,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            time_budget_secs: 60,
            default_limit: 100,
        }
    }
}

impl PollerSettings {
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }
}

/// Which queue adapter to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Http,
    #[default]
    Sqlite,
}

impl FromStr for QueueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::ValidationError(format!("unknown queue type '{}'", other))),
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Queue adapter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    #[serde(rename = "type")]
    pub queue_type: QueueType,
    pub http: HttpQueueSettings,
    pub sqlite: SqliteQueueSettings,
}

/// REST/JSON vendor queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpQueueSettings {
    pub base_url: String,
    pub api_key: String,
    /// Session login user. Empty means API-key auth without a session.
    pub username: String,
    pub password: String,
    /// Restricts the queue read to one object type (e.g. "domain")
    pub object_type: String,
    pub timeout_secs: u64,
    pub session_path: String,
    pub next_message_path: String,
    pub ack_path: String,
    pub detail_path: String,
}

impl Default for HttpQueueSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            username: String::new(),
            password: String::new(),
            object_type: "domain".to_string(),
            timeout_secs: 30,
            session_path: "/session".to_string(),
            next_message_path: "/messages/next".to_string(),
            ack_path: "/messages/{id}".to_string(),
            detail_path: "/details/{ref}".to_string(),
        }
    }
}

/// Embedded SQLite queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteQueueSettings {
    pub url: String,
    pub queue_name: String,
}

impl Default for SqliteQueueSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://registry-queue.db?mode=rwc".to_string(),
            queue_name: "registry".to_string(),
        }
    }
}

/// Vendor type-code table to start from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierPreset {
    #[default]
    Rest,
    Soap,
    Epp,
    /// Start empty and rely on `mappings` only
    None,
}

impl FromStr for ClassifierPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "soap" => Ok(Self::Soap),
            "epp" => Ok(Self::Epp),
            "none" => Ok(Self::None),
            other => Err(ConfigError::ValidationError(format!("unknown classifier preset '{}'", other))),
        }
    }
}

/// Classifier table configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub preset: ClassifierPreset,
    /// Extra raw code -> canonical type entries, applied over the preset
    pub mappings: BTreeMap<String, NotificationType>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Effective queue type, taking `dev_mode` into account
    pub fn effective_queue_type(&self) -> QueueType {
        if self.dev_mode {
            QueueType::Sqlite
        } else {
            self.queue.queue_type
        }
    }

    /// SQLite URL to open; dev mode never touches the configured file
    pub fn effective_sqlite_url(&self) -> &str {
        if self.dev_mode {
            DEV_SQLITE_URL
        } else {
            &self.queue.sqlite.url
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poller.time_budget_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poller.time_budget_secs must be greater than zero".to_string(),
            ));
        }
        if self.poller.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "poller.default_limit must be greater than zero".to_string(),
            ));
        }

        match self.effective_queue_type() {
            QueueType::Http => {
                if self.queue.http.base_url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "queue.http.base_url is required for the http queue".to_string(),
                    ));
                }
                if !self.queue.http.username.is_empty() && self.queue.http.password.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "queue.http.password is required when username is set".to_string(),
                    ));
                }
                if !self.queue.http.ack_path.contains("{id}") {
                    return Err(ConfigError::ValidationError(
                        "queue.http.ack_path must contain {id}".to_string(),
                    ));
                }
                if !self.queue.http.detail_path.contains("{ref}") {
                    return Err(ConfigError::ValidationError(
                        "queue.http.detail_path must contain {ref}".to_string(),
                    ));
                }
            }
            QueueType::Sqlite => {
                if self.effective_sqlite_url().trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "queue.sqlite.url is required for the sqlite queue".to_string(),
                    ));
                }
            }
        }

        if self.classifier.preset == ClassifierPreset::None && self.classifier.mappings.is_empty() {
            return Err(ConfigError::ValidationError(
                "classifier preset 'none' needs at least one mapping".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Registry Poller Configuration
# Environment variables (REGISTRY_POLLER_*) override these settings

dev_mode = false

[poller]
time_budget_secs = 60
default_limit = 100

[queue]
type = "http"  # http or sqlite

[queue.http]
base_url = "https://api.registrar.example/v1"
api_key = ""
username = ""
password = ""
object_type = "domain"
timeout_secs = 30
session_path = "/session"
next_message_path = "/messages/next"
ack_path = "/messages/{id}"
detail_path = "/details/{ref}"

[queue.sqlite]
url = "sqlite://registry-queue.db?mode=rwc"
queue_name = "registry"

[classifier]
preset = "rest"  # rest, soap, epp, none

[classifier.mappings]
# "VENDOR_CODE" = "transfer_in" | "transfer_out" | "renewed" | "deleted"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.poller.time_budget(), Duration::from_secs(60));
        assert_eq!(config.queue.queue_type, QueueType::Sqlite);
        config.validate().unwrap();
    }

    #[test]
    fn test_dev_mode_uses_in_memory_sqlite() {
        let mut config = AppConfig::default();
        config.queue.queue_type = QueueType::Http;
        assert_eq!(config.effective_sqlite_url(), config.queue.sqlite.url);

        config.dev_mode = true;
        assert_eq!(config.effective_queue_type(), QueueType::Sqlite);
        assert_eq!(config.effective_sqlite_url(), DEV_SQLITE_URL);
    }

    #[test]
    fn test_example_toml_parses() {
        let config = AppConfig::from_toml(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.queue.queue_type, QueueType::Http);
        assert_eq!(config.classifier.preset, ClassifierPreset::Rest);
        config.validate().unwrap();
    }

    #[test]
    fn test_mappings_parse_canonical_types() {
        let config = AppConfig::from_toml(
            r#"
[classifier]
preset = "none"

[classifier.mappings]
"XFER_IN" = "transfer_in"
"DEL" = "deleted"
"#,
        )
        .unwrap();

        assert_eq!(config.classifier.mappings.get("XFER_IN"), Some(&NotificationType::TransferIn));
        assert_eq!(config.classifier.mappings.get("DEL"), Some(&NotificationType::Deleted));
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_mapping_value_rejected() {
        let result = AppConfig::from_toml(
            r#"
[classifier.mappings]
"BILL" = "invoice"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.poller.time_budget_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.poller.default_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.queue.queue_type = QueueType::Http;
        assert!(config.validate().is_err());

        config.dev_mode = true;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.classifier.preset = ClassifierPreset::None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_type_from_str() {
        assert_eq!("HTTP".parse::<QueueType>().unwrap(), QueueType::Http);
        assert!("rabbit".parse::<QueueType>().is_err());
        assert!("memory".parse::<QueueType>().is_err());
        assert_eq!("epp".parse::<ClassifierPreset>().unwrap(), ClassifierPreset::Epp);
    }
}
