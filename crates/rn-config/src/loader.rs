//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "registry-poller.toml",
    "config.toml",
    "./config/registry-poller.toml",
    "/etc/registry-poller/config.toml",
];

/// Env var naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REGISTRY_POLLER_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found), apply environment overrides
    /// and validate the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match self.find_config_file()? {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are optional.
    fn find_config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(ConfigError::EnvError(format!(
                "{} points to missing file {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        // Poller
        if let Ok(val) = env::var("REGISTRY_POLLER_TIME_BUDGET_SECS") {
            config.poller.time_budget_secs = parse_env("REGISTRY_POLLER_TIME_BUDGET_SECS", &val)?;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_DEFAULT_LIMIT") {
            config.poller.default_limit = parse_env("REGISTRY_POLLER_DEFAULT_LIMIT", &val)?;
        }

        // Queue
        if let Ok(val) = env::var("REGISTRY_POLLER_QUEUE_TYPE") {
            config.queue.queue_type = val.parse()?;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_BASE_URL") {
            config.queue.http.base_url = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_API_KEY") {
            config.queue.http.api_key = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_USERNAME") {
            config.queue.http.username = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_PASSWORD") {
            config.queue.http.password = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_OBJECT_TYPE") {
            config.queue.http.object_type = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_HTTP_TIMEOUT_SECS") {
            config.queue.http.timeout_secs = parse_env("REGISTRY_POLLER_HTTP_TIMEOUT_SECS", &val)?;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_SQLITE_URL") {
            config.queue.sqlite.url = val;
        }
        if let Ok(val) = env::var("REGISTRY_POLLER_SQLITE_QUEUE_NAME") {
            config.queue.sqlite.queue_name = val;
        }

        // Classifier
        if let Ok(val) = env::var("REGISTRY_POLLER_CLASSIFIER_PRESET") {
            config.classifier.preset = val.parse()?;
        }

        // General
        if let Ok(val) = env::var("REGISTRY_POLLER_DEV_MODE") {
            config.dev_mode = matches!(val.trim(), "true" | "1");
            if config.dev_mode {
                warn!("Development mode enabled - using in-memory SQLite registry queue");
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{} has invalid value '{}'", name, value)))
}
