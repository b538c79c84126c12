//! Client and batch configuration.
//!
//! Everything here is supplied once at construction time. [`Settings`] bundles
//! both halves and can be read from a JSON file:
//!
//! ```json
//! {
//!   "client": { "plan": "light", "timeout_ms": 30000, "max_pages": 10 },
//!   "batch": { "max_retries": 3, "retry_delay_ms": 1000, "max_retry_delay_ms": 30000 }
//! }
//! ```

use crate::PlanTier;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.jquants.com/v2";

/// Default header carrying the API key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Default name of the continuation token, both as request parameter and response field.
pub const DEFAULT_TOKEN_NAME: &str = "pagination_key";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page cap for paginated fetches.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the settings file.
    #[error("Failed to parse settings file '{path}': {source}")]
    ParseJson {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The base URL is empty.
    #[error("Base URL must not be empty")]
    EmptyBaseUrl,

    /// The page cap is zero.
    #[error("max_pages must be at least 1")]
    ZeroMaxPages,

    /// The per-call timeout is zero.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// The base retry delay is zero.
    #[error("retry_delay_ms must be greater than zero")]
    ZeroRetryDelay,

    /// The retry delay cap is below the base delay.
    #[error("max_retry_delay_ms ({max}) must be >= retry_delay_ms ({base})")]
    RetryDelayCap {
        /// Configured base delay.
        base: u64,
        /// Configured cap.
        max: u64,
    },

    /// The batch concurrency is zero.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Configuration for the API client.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Header name carrying the API key.
    pub api_key_header: String,
    /// Subscription plan tier, which fixes the request spacing.
    pub plan: PlanTier,
    /// Hard per-call timeout.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Safety cap on pages fetched by a single paginated call.
    pub max_pages: usize,
    /// Request parameter carrying the previous page's continuation token.
    pub token_param: String,
    /// Response field carrying the next continuation token.
    pub token_field: String,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            plan: PlanTier::default(),
            timeout: DEFAULT_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
            token_param: DEFAULT_TOKEN_NAME.to_string(),
            token_field: DEFAULT_TOKEN_NAME.to_string(),
            user_agent: format!("tessera/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Checks the configuration for values the client cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty base URL, a zero timeout, or a zero page cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroMaxPages);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("api_key_header", &self.api_key_header)
            .field("plan", &self.plan)
            .field("timeout", &self.timeout)
            .field("max_pages", &self.max_pages)
            .field("token_param", &self.token_param)
            .field("token_field", &self.token_field)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Retry configuration for the batch executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Retries after the first attempt. Zero means exactly one attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub retry_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_retry_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
        }
    }
}

impl BatchConfig {
    /// Checks the delay bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the base delay is zero or the cap is below it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay_ms == 0 {
            return Err(ConfigError::ZeroRetryDelay);
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return Err(ConfigError::RetryDelayCap {
                base: self.retry_delay_ms,
                max: self.max_retry_delay_ms,
            });
        }
        Ok(())
    }
}

/// Complete settings as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Client configuration.
    pub client: ClientConfig,
    /// Batch executor configuration.
    pub batch: BatchConfig,
}

impl Settings {
    /// Returns the default settings file location, if a config directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tessera")
            .map(|proj_dirs| proj_dirs.config_dir().join("settings.json"))
    }

    /// Loads and validates settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from the default location, falling back to defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but is invalid.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validates both halves.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        self.batch.validate()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
