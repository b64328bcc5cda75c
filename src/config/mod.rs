//! Configuration system (layered: defaults < TOML file < environment).

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ReloginError};
use crate::retry::RetryConfig;
use crate::util::http::endpoint_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const HEALTH_PATH: &str = "/api/health";
pub const SESSION_PATH: &str = "/api/auth/session";
pub const ANALYTICS_PATH: &str = "/api/auth/analytics/error";

/// Retry section of [`EngineConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Restricts retries to these kinds; all retryable kinds when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable_kinds: Option<Vec<ErrorKind>>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retryable_kinds: None,
        }
    }
}

/// Engine configuration.
///
/// # Example
/// ```
/// use relogin::config::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(r#"
///     base_url = "https://app.example.com"
///     enable_analytics = false
///
///     [retry]
///     max_retries = 5
/// "#)?;
/// assert_eq!(config.retry.max_retries, 5);
/// assert_eq!(config.retry.base_delay_ms, 1000);
/// # Ok::<(), relogin::error::ReloginError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub health_path: String,
    pub session_path: String,
    pub analytics_path: String,
    pub request_timeout_ms: u64,
    pub enable_fallback: bool,
    pub enable_analytics: bool,
    /// Directory for the file-backed state store; in-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub retry: RetrySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            health_path: HEALTH_PATH.to_string(),
            session_path: SESSION_PATH.to_string(),
            analytics_path: ANALYTICS_PATH.to_string(),
            request_timeout_ms: 10_000,
            enable_fallback: true,
            enable_analytics: true,
            state_dir: None,
            retry: RetrySettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ReloginError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ReloginError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by `RELOGIN_*` environment variables (`.env` is loaded if present).
    pub fn from_env() -> Result<Self, ReloginError> {
        let _ = dotenvy::dotenv(); // missing .env is fine
        let mut config = Self::default();
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Full layering: defaults, then the file at `path` (if given), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ReloginError> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ReloginError> {
        if let Some(url) = lookup("RELOGIN_BASE_URL") {
            self.base_url = url;
        }
        if let Some(dir) = lookup("RELOGIN_STATE_DIR") {
            self.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = lookup("RELOGIN_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_var("RELOGIN_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_ENABLE_FALLBACK") {
            self.enable_fallback = parse_bool("RELOGIN_ENABLE_FALLBACK", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_ENABLE_ANALYTICS") {
            self.enable_analytics = parse_bool("RELOGIN_ENABLE_ANALYTICS", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_ENABLE_RETRY") {
            self.retry.enabled = parse_bool("RELOGIN_ENABLE_RETRY", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_MAX_RETRIES") {
            self.retry.max_retries = parse_var("RELOGIN_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_var("RELOGIN_BASE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parse_var("RELOGIN_MAX_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("RELOGIN_BACKOFF_MULTIPLIER") {
            self.retry.backoff_multiplier = parse_var("RELOGIN_BACKOFF_MULTIPLIER", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ReloginError> {
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ReloginError::Configuration(format!(
                "retry.backoff_multiplier must be >= 1, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ReloginError::Configuration(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        self.health_url()?;
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        let settings = &self.retry;
        RetryConfig::builder()
            .enabled(settings.enabled)
            .max_retries(settings.max_retries)
            .base_delay(Duration::from_millis(settings.base_delay_ms))
            .max_delay(Duration::from_millis(settings.max_delay_ms))
            .backoff_multiplier(settings.backoff_multiplier)
            .maybe_retryable_kinds(
                settings
                    .retryable_kinds
                    .as_ref()
                    .map(|kinds| kinds.iter().copied().collect()),
            )
            .build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_url(&self) -> Result<String, ReloginError> {
        endpoint_url(&self.base_url, &self.health_path)
    }

    pub fn session_url(&self) -> Result<String, ReloginError> {
        endpoint_url(&self.base_url, &self.session_path)
    }

    pub fn analytics_url(&self) -> Result<String, ReloginError> {
        endpoint_url(&self.base_url, &self.analytics_path)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ReloginError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ReloginError::Configuration(format!("{name}={value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ReloginError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ReloginError::Configuration(format!(
            "{name}={value:?}: expected a boolean"
        ))),
    }
}
