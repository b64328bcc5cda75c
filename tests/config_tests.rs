//! Tests for configuration loading and layering.

use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use relogin::config::EngineConfig;
use relogin::error::{ErrorKind, ReloginError};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 10] = [
    "RELOGIN_BASE_URL",
    "RELOGIN_ENABLE_RETRY",
    "RELOGIN_MAX_RETRIES",
    "RELOGIN_BASE_DELAY_MS",
    "RELOGIN_MAX_DELAY_MS",
    "RELOGIN_BACKOFF_MULTIPLIER",
    "RELOGIN_ENABLE_FALLBACK",
    "RELOGIN_ENABLE_ANALYTICS",
    "RELOGIN_STATE_DIR",
    "RELOGIN_REQUEST_TIMEOUT_MS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_documented_retry_policy() {
    let retry = EngineConfig::default().retry_config();
    assert!(retry.enabled);
    assert_eq!(retry.max_retries, 3);
    assert_eq!(retry.base_delay, Duration::from_millis(1000));
    assert_eq!(retry.max_delay, Duration::from_millis(10_000));
    assert_eq!(retry.backoff_multiplier, 2.0);
    assert_eq!(retry.retryable_kinds, ErrorKind::retryable_kinds());
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let file = write_config(
        r#"
        base_url = "https://auth.example.com/app/"
        enable_fallback = false

        [retry]
        max_retries = 5
        "#,
    );

    let config = EngineConfig::from_file(file.path()).unwrap();

    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert!(!config.enable_fallback);
    assert!(config.enable_analytics);
    assert_eq!(
        config.health_url().unwrap(),
        "https://auth.example.com/app/api/health"
    );
}

#[test]
fn retryable_kinds_list_restricts_the_retry_set() {
    let config = EngineConfig::from_toml_str(
        r#"
        [retry]
        retryable_kinds = ["network_error", "rate_limited"]
        "#,
    )
    .unwrap();

    let retry = config.retry_config();
    assert_eq!(retry.retryable_kinds.len(), 2);
    assert!(retry.retryable_kinds.contains(&ErrorKind::NetworkError));
    assert!(retry.retryable_kinds.contains(&ErrorKind::RateLimited));
    assert!(!retry.retryable_kinds.contains(&ErrorKind::TimeoutError));
}

#[test]
fn unknown_kind_name_is_a_serialization_error() {
    let err = EngineConfig::from_toml_str(
        r#"
        [retry]
        retryable_kinds = ["network_eror"]
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, ReloginError::Serialization(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ReloginError::Io(_)));
}

#[test]
fn environment_overrides_file_values() {
    let file = write_config(
        r#"
        base_url = "https://file.example.com"

        [retry]
        max_retries = 5
        base_delay_ms = 200
        "#,
    );
    let mut config = EngineConfig::from_file(file.path()).unwrap();

    config
        .apply_env_with(|name| match name {
            "RELOGIN_MAX_RETRIES" => Some("7".to_string()),
            "RELOGIN_STATE_DIR" => Some("/tmp/relogin-state".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.retry.base_delay_ms, 200);
    assert_eq!(config.base_url, "https://file.example.com");
    assert_eq!(
        config.state_dir.as_deref(),
        Some(std::path::Path::new("/tmp/relogin-state"))
    );
}

#[test]
fn load_layers_file_then_process_environment() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    std::env::set_var("RELOGIN_BACKOFF_MULTIPLIER", "3");
    std::env::set_var("RELOGIN_ENABLE_RETRY", "off");

    let file = write_config("request_timeout_ms = 2500\n");
    let config = EngineConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.retry.backoff_multiplier, 3.0);
    assert!(!config.retry.enabled);
    assert_eq!(config.request_timeout(), Duration::from_millis(2500));
}

#[test]
fn from_env_reads_relogin_variables() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    std::env::set_var("RELOGIN_BASE_URL", "https://env.example.com");
    std::env::set_var("RELOGIN_ENABLE_ANALYTICS", "false");

    let config = EngineConfig::from_env().unwrap();

    assert_eq!(config.base_url, "https://env.example.com");
    assert!(!config.enable_analytics);
    assert_eq!(config.retry, EngineConfig::default().retry);
}

#[test]
fn load_rejects_invalid_environment_values() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    std::env::set_var("RELOGIN_BACKOFF_MULTIPLIER", "0.5");

    let err = EngineConfig::load(None).unwrap_err();
    assert!(matches!(err, ReloginError::Configuration(msg) if msg.contains("backoff_multiplier")));
}

#[test]
fn validate_rejects_base_delay_above_max_delay() {
    let config = EngineConfig::from_toml_str(
        r#"
        [retry]
        base_delay_ms = 20000
        max_delay_ms = 5000
        "#,
    )
    .unwrap();
    assert!(matches!(
        config.validate(),
        Err(ReloginError::Configuration(_))
    ));
}

#[test]
fn validate_rejects_unparseable_base_url() {
    let config = EngineConfig {
        base_url: "not a url".to_string(),
        ..EngineConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ReloginError::Configuration(_))
    ));
}
