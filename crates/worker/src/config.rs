use std::time::Duration;

use clipcart_cloud::StorageConfig;

/// Default delay between checks for pending batch jobs.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default whole-request limit for provider HTTP calls.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Default connect limit for provider HTTP calls.
const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors raised while reading worker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub generation_api_url: String,
    pub generation_api_key: String,
    pub storage: StorageConfig,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub http_connect_timeout: Duration,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                     | Default     |
    /// |-----------------------------|-------------|
    /// | `DATABASE_URL`              | required    |
    /// | `GENERATION_API_URL`        | required    |
    /// | `GENERATION_API_KEY`        | required    |
    /// | `STORAGE_BUCKET`            | required    |
    /// | `STORAGE_REGION`            | `us-east-1` |
    /// | `STORAGE_ENDPOINT`          | unset       |
    /// | `STORAGE_PUBLIC_BASE_URL`   | required    |
    /// | `JOB_POLL_INTERVAL_SECS`    | `5`         |
    /// | `HTTP_TIMEOUT_SECS`         | `120`       |
    /// | `HTTP_CONNECT_TIMEOUT_SECS` | `10`        |
    /// | `LOG_FORMAT`                | `text`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));
        let positive_secs = |name: &'static str, default: u64| match optional(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name,
                    expected: "a positive integer",
                    value: raw,
                }),
        };

        let poll_interval_secs = positive_secs("JOB_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let http_timeout_secs = positive_secs("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let http_connect_timeout_secs =
            positive_secs("HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_HTTP_CONNECT_TIMEOUT_SECS)?;

        let log_format = match optional("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    expected: "'text' or 'json'",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            generation_api_url: required("GENERATION_API_URL")?,
            generation_api_key: required("GENERATION_API_KEY")?,
            storage: StorageConfig {
                bucket: required("STORAGE_BUCKET")?,
                region: optional("STORAGE_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint: optional("STORAGE_ENDPOINT"),
                public_base_url: required("STORAGE_PUBLIC_BASE_URL")?,
            },
            poll_interval: Duration::from_secs(poll_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            http_connect_timeout: Duration::from_secs(http_connect_timeout_secs),
            log_format,
        })
    }
}
